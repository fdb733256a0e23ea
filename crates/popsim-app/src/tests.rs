#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use popsim_core::config::WorldLayout;
    use popsim_core::{Color, ConfigError, Shape, Surface, Vector};
    use popsim_sim::{TickError, World};

    use crate::cli::{parse_args, Command, RunOptions, DEFAULT_COLUMNS};
    use crate::config_file::{demo_config, load, load_or_init, write_config};
    use crate::error::AppError;
    use crate::runner::{builtin_registry, run};
    use crate::text_surface::TextSurface;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// Writer whose contents stay readable after it is boxed away.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // ---- CLI ----

    #[test]
    fn test_parse_run_with_options() {
        let command = parse_args(&args(&[
            "run",
            "sim.json",
            "--ticks",
            "120",
            "--frame-every",
            "30",
            "--columns",
            "40",
        ]))
        .unwrap();
        assert_eq!(
            command,
            Command::Run {
                config: PathBuf::from("sim.json"),
                options: RunOptions {
                    ticks: Some(120),
                    frame_every: 30,
                    columns: 40,
                },
            }
        );
    }

    #[test]
    fn test_parse_run_defaults() {
        let command = parse_args(&args(&["run", "sim.json"])).unwrap();
        let Command::Run { options, .. } = command else {
            panic!("expected run command");
        };
        assert_eq!(options.ticks, None);
        assert_eq!(options.frame_every, 0);
        assert_eq!(options.columns, DEFAULT_COLUMNS);
    }

    #[test]
    fn test_parse_init_and_help() {
        assert_eq!(
            parse_args(&args(&["init", "out/sim.json"])).unwrap(),
            Command::Init {
                config: PathBuf::from("out/sim.json")
            }
        );
        assert_eq!(parse_args(&[]).unwrap(), Command::Help);
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), Command::Help);
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            vec!["frobnicate"],
            vec!["run"],
            vec!["run", "--ticks", "5"],
            vec!["run", "sim.json", "--ticks"],
            vec!["run", "sim.json", "--ticks", "many"],
            vec!["run", "sim.json", "--columns", "0"],
            vec!["run", "sim.json", "--speed", "2"],
            vec!["init", "a.json", "b.json"],
        ] {
            assert!(
                matches!(parse_args(&args(&bad)), Err(AppError::Usage(_))),
                "accepted {bad:?}"
            );
        }
    }

    // ---- Config files ----

    #[test]
    fn test_missing_config_is_created_with_demo_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sim.json");

        let config = load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config, demo_config());
        // Second load reads the file back unchanged.
        assert_eq!(load_or_init(&path).unwrap(), demo_config());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        std::fs::write(&path, r#"{ "tick_frequency": 30, "random_seed": "abc" }"#).unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.tick_frequency, 30);
        assert_eq!(config.world_size, [100, 100]);
        assert_eq!(config.layout, WorldLayout::Empty);
    }

    #[test]
    fn test_bad_config_files() {
        let dir = tempfile::tempdir().unwrap();

        let malformed = dir.path().join("malformed.json");
        std::fs::write(&malformed, "{ not json").unwrap();
        assert!(matches!(
            load(&malformed),
            Err(AppError::Config {
                source: ConfigError::Json(_),
                ..
            })
        ));

        let invalid = dir.path().join("invalid.json");
        let mut config = demo_config();
        config.world_size = [0, 100];
        write_config(&invalid, &config).unwrap();
        assert!(matches!(
            load(&invalid),
            Err(AppError::Config {
                source: ConfigError::InvalidWorldSize { width: 0, .. },
                ..
            })
        ));

        assert!(matches!(
            load(&dir.path().join("absent.json")),
            Err(AppError::Io { .. })
        ));
    }

    #[test]
    fn test_demo_config_resolves() {
        let world = World::new(&demo_config(), &builtin_registry().unwrap()).unwrap();
        assert!(world.entity_type("particle").is_some());
    }

    // ---- Text surface ----

    #[test]
    fn test_text_surface_marks_cells() {
        let mut surface = TextSurface::for_world(100, 100, 20);
        assert_eq!(surface.columns(), 20);
        assert_eq!(surface.rows(), 10);
        let frame = surface.latest_frame();

        surface.clear(Color::BLACK);
        surface.fill(Shape::Circle, Vector::new(55.0, 55.0), 1.5, Color::WHITE);
        surface.fill(Shape::Square, Vector::new(0.0, 0.0), 1.5, Color::WHITE);
        surface.fill(Shape::Circle, Vector::new(-1.0, 5.0), 1.5, Color::WHITE);
        surface.fill(Shape::Circle, Vector::new(100.0, 5.0), 1.5, Color::WHITE);
        surface.present();

        let text = frame.lock().unwrap().clone();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[5].chars().nth(11), Some('@'));
        assert_eq!(lines[0].chars().next(), Some('#'));
        assert_eq!(text.chars().filter(|c| !c.is_whitespace()).count(), 2);

        surface.clear(Color::BLACK);
        surface.present();
        assert!(frame.lock().unwrap().trim().is_empty());
    }

    #[test]
    fn test_text_surface_prints_every_nth_frame() {
        let buf = SharedBuf::default();
        let mut surface =
            TextSurface::for_world(100, 100, 8).with_output(2, Box::new(buf.clone()));
        for _ in 0..5 {
            surface.clear(Color::BLACK);
            surface.present();
        }
        let text = buf.text();
        assert!(!text.contains("frame 1\n"));
        assert!(text.contains("frame 2\n"));
        assert!(text.contains("frame 4\n"));
        assert!(!text.contains("frame 5\n"));
    }

    // ---- Runner ----

    #[test]
    fn test_run_demo_for_a_few_ticks() {
        let mut config = demo_config();
        config.tick_frequency = 1000;
        config.random_seed = "demo".into();
        let buf = SharedBuf::default();
        let options = RunOptions {
            ticks: Some(5),
            frame_every: 1,
            columns: 20,
        };

        let summary = run(&config, &options, Box::new(buf.clone())).unwrap();
        assert!(summary.ticks >= 5);
        assert_eq!(summary.live, 50);
        assert!(buf.text().contains("frame 1\n"));
    }

    #[test]
    fn test_run_reports_tick_failure() {
        let mut config = demo_config();
        config.tick_frequency = 1000;
        if let Some(particle) = config.entity_types.get_mut("particle") {
            particle
                .data
                .insert("color".into(), serde_json::json!("not-a-color"));
        }
        let options = RunOptions {
            ticks: Some(100),
            ..Default::default()
        };

        match run(&config, &options, Box::new(io::sink())) {
            Err(AppError::Tick(failure)) => {
                assert!(matches!(*failure, TickError::Init { .. }))
            }
            other => panic!("expected tick failure, got {other:?}"),
        }
    }
}
