#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::config::{parse_seed, ConfigError, PeriodicConfig, SimConfig, WorldLayout};
    use crate::surface::{Color, DrawCommand, RecordingSurface, Shape, Surface};
    use crate::vector::Vector;

    // ---- Configuration ----

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        config.validate().unwrap();
        assert_eq!(config.tick_frequency, 60);
        assert_eq!(config.world_size, [100, 100]);
        assert_eq!(config.layout, WorldLayout::Empty);
    }

    #[test]
    fn test_tick_interval_from_frequency() {
        let config = SimConfig {
            tick_frequency: 50,
            ..Default::default()
        };
        assert_eq!(config.tick_interval().unwrap(), Duration::from_millis(20));

        // 60 Hz truncates to whole nanoseconds.
        let config = SimConfig::default();
        assert_eq!(config.tick_interval().unwrap().as_nanos(), 16_666_666);
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let config = SimConfig {
            tick_frequency: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTickFrequency)));
        assert!(config.tick_interval().is_err());
    }

    #[test]
    fn test_zero_world_dimension_rejected() {
        let config = SimConfig {
            world_size: [100, 0],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorldSize {
                width: 100,
                height: 0
            })
        ));
    }

    #[test]
    fn test_zero_period_rejected() {
        let config = SimConfig {
            periodic_scripts: vec![PeriodicConfig {
                script: "census".into(),
                period: 0,
                delay: None,
            }],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPeriod { .. })));
    }

    #[test]
    fn test_config_json_with_defaults() {
        let json = r##"{
            "tick_frequency": 30,
            "random_seed": "1234",
            "entity_types": {
                "particle": {
                    "behavior_scripts": ["repel"],
                    "render_scripts": ["dot"],
                    "data": { "color": "#ffffff" }
                }
            },
            "layout": { "kind": "cluster", "entity_type": "particle", "count": 8 }
        }"##;
        let config: SimConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tick_frequency, 30);
        assert_eq!(config.world_size, [100, 100]);
        assert_eq!(config.seed(), 1234);
        assert_eq!(config.entity_types["particle"].behavior_scripts, vec!["repel"]);
        assert_eq!(
            config.layout,
            WorldLayout::Cluster {
                entity_type: "particle".into(),
                count: 8,
                at: None
            }
        );
    }

    #[test]
    fn test_malformed_config_is_json_error() {
        let err = serde_json::from_str::<SimConfig>(r#"{ "world_size": [1, 2, 3] }"#)
            .map_err(ConfigError::from)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    // ---- Seeds ----

    #[test]
    fn test_integer_seed_used_verbatim() {
        assert_eq!(parse_seed("42"), 42);
        assert_eq!(parse_seed("-1"), u64::MAX);
        assert_eq!(parse_seed("9223372036854775807"), i64::MAX as u64);
    }

    #[test]
    fn test_padded_or_oversized_seed_is_hashed() {
        assert_ne!(parse_seed(" 7 "), 7);
        assert_eq!(parse_seed(" 7 "), parse_seed(" 7 "));
        // Past i64::MAX is text, not a number.
        let big = "9223372036854775808";
        assert_ne!(parse_seed(big), 9_223_372_036_854_775_808);
        assert_eq!(parse_seed(big), parse_seed(big));
    }

    #[test]
    fn test_blank_seed_is_not_the_clock() {
        let a = parse_seed("   ");
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(parse_seed("   "), a);
    }

    #[test]
    fn test_text_seed_is_deterministic_hash() {
        let a = parse_seed("hello world");
        let b = parse_seed("hello world");
        let c = parse_seed("hello worle");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_seed_uses_clock() {
        // Wall-clock millis are well past 2020 on any machine running this.
        assert!(parse_seed("") > 1_577_836_800_000);
    }

    // ---- Surface ----

    #[test]
    fn test_color_hex_round_trip() {
        let color: Color = "#ff8000".parse().unwrap();
        assert_eq!(color, Color::rgb(255, 128, 0));
        assert_eq!(color.to_string(), "#ff8000");
        assert!("#ff80".parse::<Color>().is_err());
        assert!("zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn test_recording_surface_frames() {
        let mut surface = RecordingSurface::new();
        let log = surface.log();

        surface.clear(Color::BLACK);
        surface.fill(Shape::Circle, Vector::new(1.0, 2.0), 1.5, Color::WHITE);
        assert_eq!(log.lock().unwrap().frames, 0);

        surface.present();
        let log = log.lock().unwrap();
        assert_eq!(log.frames, 1);
        assert_eq!(log.last_frame.len(), 2);
        assert_eq!(log.last_frame[0], DrawCommand::Clear(Color::BLACK));
    }
}
