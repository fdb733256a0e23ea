#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use popsim_core::config::{EntityTypeConfig, PeriodicConfig};
    use popsim_core::surface::{DrawCommand, NullSurface, RecordingSurface};
    use popsim_core::{Color, Data, Shape, SimConfig, Surface, Vector};
    use popsim_sim::{
        BehaviorScript, Entity, ResolutionError, ScriptError, ScriptRegistry, TickError,
        TickOutcome, TickPipeline, World,
    };

    use crate::{register_builtin_scripts, Census, Repel};

    const EPS: f64 = 1e-9;

    fn registry() -> ScriptRegistry {
        let mut registry = ScriptRegistry::new();
        register_builtin_scripts(&mut registry).unwrap();
        registry
    }

    fn repeller() -> EntityTypeConfig {
        EntityTypeConfig {
            behavior_scripts: vec!["repel".into()],
            ..Default::default()
        }
    }

    fn config(width: u32, types: Vec<(&str, EntityTypeConfig)>) -> SimConfig {
        SimConfig {
            random_seed: "42".into(),
            world_size: [width, 100],
            entity_types: types
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
            ..Default::default()
        }
    }

    fn pipeline_on(
        config: &SimConfig,
        registry: &ScriptRegistry,
        surface: Box<dyn Surface>,
    ) -> (Arc<World>, TickPipeline) {
        let world = Arc::new(World::new(config, registry).unwrap());
        world.init().unwrap();
        let pipeline = TickPipeline::new(Arc::clone(&world), surface, Some(2)).unwrap();
        (world, pipeline)
    }

    fn tick(pipeline: &TickPipeline) {
        assert!(matches!(
            pipeline.run_tick().unwrap(),
            TickOutcome::Completed(_)
        ));
    }

    // ---- Repulsion ----

    #[test]
    fn test_coincident_pair_separates_in_opposite_directions() {
        let config = config(100, vec![("r", repeller())]);
        let (world, pipeline) = pipeline_on(&config, &registry(), Box::new(NullSurface));
        let ty = world.entity_type("r").unwrap();
        let a = world.spawn_at(&ty, Vector::new(50.0, 50.0));
        let b = world.spawn_at(&ty, Vector::new(50.0, 50.0));

        tick(&pipeline);

        let start = Vector::new(50.0, 50.0);
        let (da, db) = (a.current() - start, b.current() - start);
        assert_ne!(a.current(), b.current());
        assert!(da.x * db.x < 0.0, "x not opposed: {da} vs {db}");
        assert!(da.y * db.y < 0.0, "y not opposed: {da} vs {db}");
        // Equal and opposite.
        assert!((da + db).mag() < EPS);
    }

    #[test]
    fn test_pair_keeps_separating() {
        let config = config(100, vec![("r", repeller())]);
        let (world, pipeline) = pipeline_on(&config, &registry(), Box::new(NullSurface));
        let ty = world.entity_type("r").unwrap();
        let a = world.spawn_at(&ty, Vector::new(45.0, 50.0));
        let b = world.spawn_at(&ty, Vector::new(55.0, 50.0));

        let mut gap = 10.0;
        for _ in 0..10 {
            tick(&pipeline);
            let next = b.current().x - a.current().x;
            assert!(next > gap);
            gap = next;
        }
        assert!((a.current().y - 50.0).abs() < EPS);
        assert!((a.current().x + b.current().x - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_range_cutoff() {
        let config = config(400, vec![("r", repeller())]);
        let (world, pipeline) = pipeline_on(&config, &registry(), Box::new(NullSurface));
        let ty = world.entity_type("r").unwrap();
        let a = world.spawn_at(&ty, Vector::new(100.0, 50.0));
        let b = world.spawn_at(&ty, Vector::new(229.0, 50.0));

        tick(&pipeline);
        assert_eq!(a.current(), Vector::new(100.0, 50.0));
        assert_eq!(b.current(), Vector::new(229.0, 50.0));
    }

    #[test]
    fn test_other_types_are_ignored() {
        let config = config(100, vec![("r", repeller()), ("s", repeller())]);
        let (world, pipeline) = pipeline_on(&config, &registry(), Box::new(NullSurface));
        let a = world.spawn_at(&world.entity_type("r").unwrap(), Vector::new(50.0, 50.0));
        let b = world.spawn_at(&world.entity_type("s").unwrap(), Vector::new(50.0, 50.0));

        tick(&pipeline);
        assert_eq!(a.current(), Vector::new(50.0, 50.0));
        assert_eq!(b.current(), Vector::new(50.0, 50.0));
    }

    // ---- Boundaries ----

    /// Place an entity at `current` heading for `future` and run the repel
    /// finalize hook on it.
    fn bounce(current: Vector, future: Vector) -> Arc<Entity> {
        let config = config(100, vec![("r", repeller())]);
        let world = World::new(&config, &registry()).unwrap();
        let e = world.spawn_at(&world.entity_type("r").unwrap(), current);
        e.set_future(future);
        Repel::default()
            .finalize(&world, &e, &mut Data::new())
            .unwrap();
        e
    }

    #[test]
    fn test_reflection_on_every_wall() {
        let repel = Repel::default();
        let (low, high) = (repel.radius, 100.0 - repel.radius);
        let d = 2.0;
        let damp = repel.damping;

        let right = bounce(Vector::new(high - 1.0, 50.0), Vector::new(high + d, 50.0));
        assert!((right.future().x - (high - d * damp)).abs() < EPS);
        assert!(right.current().x > high);
        assert_eq!(right.future().y, 50.0);

        let left = bounce(Vector::new(low + 1.0, 50.0), Vector::new(low - d, 50.0));
        assert!((left.future().x - (low + d * damp)).abs() < EPS);
        assert!(left.current().x < low);

        let bottom = bounce(Vector::new(50.0, high - 1.0), Vector::new(50.0, high + d));
        assert!((bottom.future().y - (high - d * damp)).abs() < EPS);
        assert!(bottom.current().y > high);
        assert_eq!(bottom.future().x, 50.0);

        let top = bounce(Vector::new(50.0, low + 1.0), Vector::new(50.0, low - d));
        assert!((top.future().y - (low + d * damp)).abs() < EPS);
        assert!(top.current().y < low);
    }

    #[test]
    fn test_reflection_reverses_velocity() {
        let repel = Repel::default();
        let high = 100.0 - repel.radius;
        let e = bounce(Vector::new(high - 1.0, 50.0), Vector::new(high + 2.0, 50.0));
        let after = e.future() - e.current();
        // Incoming step was +3 along x.
        assert!((after.x + 3.0 * repel.damping).abs() < EPS);
    }

    #[test]
    fn test_inside_is_untouched() {
        let e = bounce(Vector::new(40.0, 40.0), Vector::new(41.0, 39.0));
        assert_eq!(e.current(), Vector::new(40.0, 40.0));
        assert_eq!(e.future(), Vector::new(41.0, 39.0));
    }

    // ---- Dot ----

    #[test]
    fn test_dot_uses_entity_data() {
        let mut ty = EntityTypeConfig {
            render_scripts: vec!["dot".into()],
            ..Default::default()
        };
        ty.data.insert("size".into(), serde_json::json!(3));
        ty.data.insert("color".into(), serde_json::json!("#ff0000"));
        let plain = EntityTypeConfig {
            render_scripts: vec!["dot".into()],
            ..Default::default()
        };
        let config = config(100, vec![("red", ty), ("plain", plain)]);
        let surface = RecordingSurface::new();
        let log = surface.log();
        let (world, pipeline) = pipeline_on(&config, &registry(), Box::new(surface));
        world.spawn_at(&world.entity_type("red").unwrap(), Vector::new(1.0, 2.0));
        world.spawn_at(&world.entity_type("plain").unwrap(), Vector::new(3.0, 4.0));

        tick(&pipeline);
        let log = log.lock().unwrap();
        let fills = &log.last_frame[1..];
        assert_eq!(fills.len(), 2);
        assert_eq!(log.last_frame[0], DrawCommand::Clear(Color::BLACK));
        assert!(fills.contains(&DrawCommand::Fill {
            shape: Shape::Circle,
            center: Vector::new(1.0, 2.0),
            size: 3.0,
            color: Color::rgb(255, 0, 0),
        }));
        assert!(fills.contains(&DrawCommand::Fill {
            shape: Shape::Circle,
            center: Vector::new(3.0, 4.0),
            size: 1.5,
            color: Color::WHITE,
        }));
    }

    #[test]
    fn test_dot_rejects_bad_color() {
        let mut ty = EntityTypeConfig {
            render_scripts: vec!["dot".into()],
            ..Default::default()
        };
        ty.data.insert("color".into(), serde_json::json!("chartreuse"));
        let config = config(100, vec![("bad", ty)]);
        let (world, pipeline) = pipeline_on(&config, &registry(), Box::new(NullSurface));
        world.spawn(&world.entity_type("bad").unwrap());

        assert!(matches!(
            pipeline.run_tick(),
            Err(TickError::Init {
                source: ScriptError::Failed(_),
                ..
            })
        ));
    }

    // ---- Census ----

    #[test]
    fn test_census_counts_by_type() {
        let census = Arc::new(Census::new());
        let mut registry = registry();
        registry
            .register_periodic("headcount", census.clone())
            .unwrap();
        let mut config = config(100, vec![("r", repeller()), ("s", EntityTypeConfig::default())]);
        config.periodic_scripts.push(PeriodicConfig {
            script: "headcount".into(),
            period: 1,
            delay: None,
        });
        let (world, pipeline) = pipeline_on(&config, &registry, Box::new(NullSurface));
        assert!(census.latest().is_none());

        let r = world.entity_type("r").unwrap();
        world.spawn_at(&r, Vector::new(20.0, 20.0));
        world.spawn_at(&r, Vector::new(80.0, 80.0));
        world.spawn(&world.entity_type("s").unwrap());
        for _ in 0..3 {
            tick(&pipeline);
        }

        let report = census.latest().unwrap();
        assert_eq!(report.tick, 2);
        assert_eq!(report.total, 3);
        assert_eq!(
            report.by_type,
            BTreeMap::from([("r".to_string(), 2), ("s".to_string(), 1)])
        );
    }

    #[test]
    fn test_builtins_register_once() {
        let mut registry = registry();
        assert!(registry.behavior("repel").is_some());
        assert!(registry.render("dot").is_some());
        assert!(registry.periodic("census").is_some());
        assert_eq!(
            register_builtin_scripts(&mut registry),
            Err(ResolutionError::DuplicateScript("repel".into()))
        );
    }
}
