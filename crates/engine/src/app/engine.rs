use std::any::type_name;
use std::path::PathBuf;

use tracing::{debug, info};

use super::camera::{Camera, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN, DEFAULT_PIXELS_PER_UNIT};
use super::component::FrameInfo;
use super::entity::{Entity, EntityId, SceneGraph};
use super::images::ImageStore;
use super::input::{
    ButtonState, InputSystem, Key, PointerButton, PointerButtonState, RawInput,
    DEFAULT_CLICK_DISTANCE_PX,
};
use super::metrics::FrameStats;
use super::pointer::update_hover;
use super::rendering::{compile_scene, execute, Color, DrawSurface, RenderQueue, Viewport};
use super::scene::{Scene, SceneContext, SceneRuntime, SceneSpace};
use crate::EngineError;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub clear_color: Color,
    pub pixels_per_unit: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub click_distance_px: f32,
    pub pan_button: Option<PointerButton>,
    /// Hold rendering while image loads are in flight.
    pub wait_for_images: bool,
    pub asset_root: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clear_color: Color::rgb(20, 22, 28),
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
            min_zoom: CAMERA_ZOOM_MIN,
            max_zoom: CAMERA_ZOOM_MAX,
            click_distance_px: DEFAULT_CLICK_DISTANCE_PX,
            pan_button: Some(PointerButton::Middle),
            wait_for_images: false,
            asset_root: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub rendered: bool,
    /// A render was due but held back by pending image loads.
    pub waiting_for_images: bool,
    pub command_count: usize,
    pub draw_calls: usize,
}

enum SceneHook {
    Load,
    Unload,
}

/// Owns the named scenes and the shared systems, and runs the per-tick
/// pipeline.
pub struct Engine {
    config: EngineConfig,
    scenes: Vec<SceneRuntime>,
    input: InputSystem,
    camera: Camera,
    images: ImageStore,
    viewport: Viewport,
    queue: RenderQueue,
    force_render: bool,
    stats: FrameStats,
    elapsed_seconds: f64,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let mut camera = Camera::new(config.pixels_per_unit, config.min_zoom, config.max_zoom);
        camera.set_pan_button(config.pan_button);
        Self {
            input: InputSystem::new(config.click_distance_px),
            images: ImageStore::new(config.asset_root.clone()),
            camera,
            config,
            scenes: Vec::new(),
            viewport: Viewport::default(),
            queue: RenderQueue::default(),
            force_render: true,
            stats: FrameStats::default(),
            elapsed_seconds: 0.0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Appends a scene; later scenes draw above earlier ones.
    pub fn add_scene(&mut self, name: &str, space: SceneSpace) -> Result<&mut SceneGraph, EngineError> {
        if self.scene_index(name).is_ok() {
            return Err(EngineError::DuplicateScene(name.to_string()));
        }
        self.scenes.push(SceneRuntime::new(name, space));
        self.force_render = true;
        info!(scene = name, space = ?space, "scene_added");
        let runtime = self
            .scenes
            .last_mut()
            .ok_or_else(|| EngineError::MissingScene(name.to_string()))?;
        Ok(&mut runtime.graph)
    }

    /// Installs (and loads) the behavior of `name`, unloading any previous one.
    pub fn set_scene_behavior<S: Scene>(&mut self, name: &str, scene: S) -> Result<(), EngineError> {
        let index = self.scene_index(name)?;
        self.call_hook(index, SceneHook::Unload);
        self.scenes[index].behavior = Some(Box::new(scene));
        self.call_hook(index, SceneHook::Load);
        Ok(())
    }

    pub fn remove_scene(&mut self, name: &str) -> Result<(), EngineError> {
        let index = self.scene_index(name)?;
        self.call_hook(index, SceneHook::Unload);
        self.scenes.remove(index);
        self.force_render = true;
        info!(scene = name, "scene_removed");
        Ok(())
    }

    pub fn scene_names(&self) -> impl Iterator<Item = &str> {
        self.scenes.iter().map(|runtime| runtime.name.as_str())
    }

    pub fn scene_graph(&self, name: &str) -> Result<&SceneGraph, EngineError> {
        let index = self.scene_index(name)?;
        Ok(&self.scenes[index].graph)
    }

    pub fn scene_graph_mut(&mut self, name: &str) -> Result<&mut SceneGraph, EngineError> {
        let index = self.scene_index(name)?;
        Ok(&mut self.scenes[index].graph)
    }

    /// Adds `entity` under `parent`, or under the scene root when `None`.
    pub fn add_entity(
        &mut self,
        scene: &str,
        parent: Option<EntityId>,
        entity: Entity,
    ) -> Result<EntityId, EngineError> {
        let graph = self.scene_graph_mut(scene)?;
        let parent = parent.unwrap_or_else(|| graph.root());
        graph.add_child(parent, entity)
    }

    pub fn remove_entity(&mut self, scene: &str, id: EntityId) -> Result<bool, EngineError> {
        Ok(self.scene_graph_mut(scene)?.remove(id))
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn input(&self) -> &InputSystem {
        &self.input
    }

    pub fn push_input(&mut self, event: RawInput) {
        self.input.push(event);
    }

    pub fn key_state(&self, key: Key) -> ButtonState {
        self.input.key(key)
    }

    pub fn button_state(&self, button: PointerButton) -> PointerButtonState {
        self.input.button(button)
    }

    pub fn capture_click(&mut self, button: PointerButton) -> bool {
        self.input.capture_click(button)
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn images_mut(&mut self) -> &mut ImageStore {
        &mut self.images
    }

    pub fn request_render(&mut self) {
        self.force_render = true;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.viewport != viewport {
            self.viewport = viewport;
            self.force_render = true;
        }
    }

    pub fn hovered(&self, scene: &str) -> Option<EntityId> {
        let index = self.scene_index(scene).ok()?;
        self.scenes[index].hovered
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// Runs `f` against the typed behavior of `name`.
    pub fn with_scene<S: Scene, R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut S, &mut SceneContext<'_>) -> R,
    ) -> Result<R, EngineError> {
        let index = self.scene_index(name)?;
        let elapsed_seconds = self.elapsed_seconds;
        let viewport = self.viewport;
        let SceneRuntime {
            space,
            graph,
            behavior,
            hovered,
            ..
        } = &mut self.scenes[index];
        let mismatch = || EngineError::SceneTypeMismatch {
            scene: name.to_string(),
            expected: type_name::<S>(),
        };
        let scene = behavior
            .as_mut()
            .ok_or_else(mismatch)?
            .as_any_mut()
            .downcast_mut::<S>()
            .ok_or_else(mismatch)?;
        let mut ctx = SceneContext {
            dt_seconds: 0.0,
            elapsed_seconds,
            space: *space,
            graph,
            input: &mut self.input,
            camera: &mut self.camera,
            images: &mut self.images,
            viewport,
            hovered: *hovered,
        };
        Ok(f(scene, &mut ctx))
    }

    /// One frame: image poll, input sample, hover, scene updates, entity
    /// updates, camera update, then render only if something changed.
    pub fn tick(&mut self, dt_seconds: f32, surface: &mut dyn DrawSurface) -> FrameReport {
        let dt_seconds = if dt_seconds.is_finite() { dt_seconds.max(0.0) } else { 0.0 };
        self.elapsed_seconds += dt_seconds as f64;
        let (width, height) = surface.size();
        self.set_viewport(Viewport::new(width, height));

        if self.images.poll() {
            self.force_render = true;
        }
        self.input
            .sample(dt_seconds, self.camera.screen_to_world_matrix(self.viewport));

        let mut changed = self.update_hover();
        changed |= self.update_scenes(dt_seconds);
        changed |= self.update_entities(dt_seconds);
        changed |= self.camera.update(dt_seconds, &mut self.input, self.viewport);
        for runtime in &mut self.scenes {
            changed |= runtime.graph.take_pending_render();
        }

        let mut report = FrameReport::default();
        if changed || self.force_render {
            report = self.render(surface);
        }
        self.stats.record(report.rendered);
        report
    }

    fn update_hover(&mut self) -> bool {
        let mut changed = false;
        let mut claimed = false;
        for runtime in self.scenes.iter_mut().rev() {
            runtime.graph.sort_pending();
            let pointer = if claimed {
                None
            } else {
                runtime.pointer(&self.input)
            };
            let outcome = update_hover(&mut runtime.graph, pointer);
            claimed |= outcome.target.is_some();
            runtime.hovered = outcome.target;
            changed |= outcome.changed;
        }
        changed
    }

    fn update_scenes(&mut self, dt_seconds: f32) -> bool {
        let mut changed = false;
        for runtime in &mut self.scenes {
            let SceneRuntime {
                space,
                graph,
                behavior,
                hovered,
                ..
            } = runtime;
            let Some(behavior) = behavior.as_mut() else {
                continue;
            };
            let mut ctx = SceneContext {
                dt_seconds,
                elapsed_seconds: self.elapsed_seconds,
                space: *space,
                graph,
                input: &mut self.input,
                camera: &mut self.camera,
                images: &mut self.images,
                viewport: self.viewport,
                hovered: *hovered,
            };
            changed |= behavior.update(&mut ctx);
        }
        changed
    }

    fn update_entities(&mut self, dt_seconds: f32) -> bool {
        let mut changed = false;
        for runtime in &mut self.scenes {
            let frame = FrameInfo {
                dt_seconds,
                elapsed_seconds: self.elapsed_seconds,
                pointer: runtime.pointer(&self.input),
                camera_zoom: self.camera.zoom(),
            };
            changed |= runtime.graph.update(frame);
        }
        changed
    }

    fn render(&mut self, surface: &mut dyn DrawSurface) -> FrameReport {
        self.queue.clear();
        for runtime in &mut self.scenes {
            runtime.graph.sort_pending();
        }
        for runtime in &self.scenes {
            compile_scene(
                &runtime.graph,
                runtime.space,
                &self.camera,
                self.viewport,
                &mut self.queue,
            );
        }

        let unknown: Vec<String> = self
            .queue
            .image_names()
            .filter(|name| !self.images.contains(name))
            .map(str::to_string)
            .collect();
        for name in unknown {
            self.images.request(&name);
        }

        if self.config.wait_for_images && !self.images.is_idle() {
            self.force_render = true;
            debug!(pending = self.images.pending_count(), "render_waiting_for_images");
            return FrameReport {
                waiting_for_images: true,
                command_count: self.queue.len(),
                ..FrameReport::default()
            };
        }

        let executed = execute(
            self.queue.commands(),
            surface,
            &self.images,
            self.config.clear_color,
        );
        self.camera.clear_dirty();
        self.force_render = false;
        self.stats.last_command_count = self.queue.len();
        self.stats.last_draw_calls = executed.draw_calls;
        FrameReport {
            rendered: true,
            waiting_for_images: false,
            command_count: self.queue.len(),
            draw_calls: executed.draw_calls,
        }
    }

    /// Unloads every scene behavior.
    pub fn shutdown(&mut self) {
        for index in 0..self.scenes.len() {
            self.call_hook(index, SceneHook::Unload);
        }
    }

    fn scene_index(&self, name: &str) -> Result<usize, EngineError> {
        self.scenes
            .iter()
            .position(|runtime| runtime.name == name)
            .ok_or_else(|| EngineError::MissingScene(name.to_string()))
    }

    fn call_hook(&mut self, index: usize, hook: SceneHook) {
        let Some(runtime) = self.scenes.get_mut(index) else {
            return;
        };
        let SceneRuntime {
            name,
            space,
            graph,
            behavior,
            is_loaded,
            hovered,
        } = runtime;
        let Some(behavior) = behavior.as_mut() else {
            return;
        };
        let mut ctx = SceneContext {
            dt_seconds: 0.0,
            elapsed_seconds: self.elapsed_seconds,
            space: *space,
            graph,
            input: &mut self.input,
            camera: &mut self.camera,
            images: &mut self.images,
            viewport: self.viewport,
            hovered: *hovered,
        };
        match hook {
            SceneHook::Load => {
                behavior.load(&mut ctx);
                *is_loaded = true;
                info!(scene = %name, entity_count = ctx.graph.len(), "scene_loaded");
            }
            SceneHook::Unload if *is_loaded => {
                behavior.unload(&mut ctx);
                *is_loaded = false;
                info!(scene = %name, "scene_unloaded");
            }
            SceneHook::Unload => {}
        }
        self.force_render = true;
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use glam::Vec2;
    use tempfile::TempDir;

    use super::*;
    use crate::app::component::{Component, RenderContext, UpdateContext};
    use crate::app::pointer::PointerTarget;
    use crate::app::rendering::{DrawCall, Rect, RecordingSurface, Style};

    struct Block;

    impl Component for Block {
        fn queue_render_commands(&self, _ctx: &RenderContext<'_>, queue: &mut RenderQueue) {
            queue.rect(Rect::new(0.0, 0.0, 1.0, 1.0), Style::fill(Color::WHITE));
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Spinner;

    impl Component for Spinner {
        fn update(&mut self, ctx: &mut UpdateContext<'_>) -> bool {
            let rotation = ctx
                .graph
                .transform(ctx.entity)
                .map(|t| t.rotation_degrees())
                .unwrap_or_default();
            ctx.graph
                .set_rotation_degrees(ctx.entity, rotation + 90.0 * ctx.frame.dt_seconds)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct CountingScene {
        loads: u32,
        updates: u32,
        unloads: u32,
    }

    impl Scene for CountingScene {
        fn load(&mut self, _ctx: &mut SceneContext<'_>) {
            self.loads += 1;
        }

        fn update(&mut self, _ctx: &mut SceneContext<'_>) -> bool {
            self.updates += 1;
            false
        }

        fn unload(&mut self, _ctx: &mut SceneContext<'_>) {
            self.unloads += 1;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn engine_with_block() -> (Engine, EntityId) {
        let mut engine = Engine::new(EngineConfig::default());
        engine.add_scene("world", SceneSpace::World).expect("scene");
        let block = engine
            .add_entity("world", None, Entity::new("block").with_component(Block))
            .expect("entity");
        (engine, block)
    }

    #[test]
    fn idle_frames_skip_rendering_entirely() {
        let (mut engine, _) = engine_with_block();
        let mut surface = RecordingSurface::new(64, 64);

        assert!(engine.tick(0.016, &mut surface).rendered);
        let calls_after_first = surface.calls().len();
        assert!(calls_after_first > 0);

        for _ in 0..5 {
            let report = engine.tick(0.016, &mut surface);
            assert!(!report.rendered);
        }
        assert_eq!(surface.calls().len(), calls_after_first);
        assert_eq!(engine.stats().rendered_frames, 1);
        assert_eq!(engine.stats().skipped_frames, 5);
    }

    #[test]
    fn entity_camera_and_forced_changes_each_trigger_one_render() {
        let (mut engine, block) = engine_with_block();
        let mut surface = RecordingSurface::new(64, 64);
        engine.tick(0.016, &mut surface);

        engine
            .scene_graph_mut("world")
            .expect("graph")
            .set_position(block, Vec2::new(1.0, 0.0));
        assert!(engine.tick(0.016, &mut surface).rendered);
        assert!(!engine.tick(0.016, &mut surface).rendered);

        engine.camera_mut().set_zoom(2.0);
        assert!(engine.tick(0.016, &mut surface).rendered);
        assert!(!engine.tick(0.016, &mut surface).rendered);

        engine.request_render();
        assert!(engine.tick(0.016, &mut surface).rendered);
        assert!(!engine.tick(0.016, &mut surface).rendered);
    }

    #[test]
    fn updating_components_keep_rendering_every_frame() {
        let (mut engine, _) = engine_with_block();
        engine
            .add_entity("world", None, Entity::new("spinner").with_component(Spinner))
            .expect("spinner");
        let mut surface = RecordingSurface::new(64, 64);
        for _ in 0..3 {
            assert!(engine.tick(0.016, &mut surface).rendered);
        }
    }

    #[test]
    fn world_scene_draws_through_camera_and_screen_scene_does_not() {
        let (mut engine, _) = engine_with_block();
        engine.add_scene("hud", SceneSpace::Screen).expect("hud");
        engine
            .add_entity("hud", None, Entity::new("panel").with_component(Block))
            .expect("panel");
        let mut surface = RecordingSurface::new(100, 100);
        engine.tick(0.016, &mut surface);

        let transforms: Vec<_> = surface
            .calls()
            .iter()
            .filter_map(|call| match call {
                DrawCall::FillRect { transform, .. } => Some(*transform),
                _ => None,
            })
            .collect();
        assert_eq!(transforms.len(), 2);
        let camera = engine.camera().world_to_screen_matrix(Viewport::new(100, 100));
        assert_eq!(transforms[0], camera);
        assert_eq!(transforms[1], glam::Affine2::IDENTITY);
    }

    #[test]
    fn scene_lookup_errors_are_reported() {
        let mut engine = Engine::new(EngineConfig::default());
        engine.add_scene("world", SceneSpace::World).expect("scene");
        assert!(matches!(
            engine.add_scene("world", SceneSpace::World),
            Err(EngineError::DuplicateScene(_))
        ));
        assert!(matches!(
            engine.scene_graph("missing"),
            Err(EngineError::MissingScene(_))
        ));
        let err = engine
            .with_scene::<CountingScene, _>("world", |_, _| ())
            .expect_err("no behavior yet");
        assert!(matches!(err, EngineError::SceneTypeMismatch { .. }));
    }

    #[test]
    fn scene_behavior_lifecycle_runs_load_update_unload() {
        let mut engine = Engine::new(EngineConfig::default());
        engine.add_scene("world", SceneSpace::World).expect("scene");
        engine
            .set_scene_behavior("world", CountingScene::default())
            .expect("behavior");
        let mut surface = RecordingSurface::new(8, 8);
        engine.tick(0.016, &mut surface);
        engine.tick(0.016, &mut surface);

        let (loads, updates) = engine
            .with_scene::<CountingScene, _>("world", |scene, _| (scene.loads, scene.updates))
            .expect("scene");
        assert_eq!((loads, updates), (1, 2));

        engine.shutdown();
        let unloads = engine
            .with_scene::<CountingScene, _>("world", |scene, _| scene.unloads)
            .expect("scene");
        assert_eq!(unloads, 1);
    }

    #[test]
    fn screen_scene_on_top_wins_hover_over_world_scene() {
        let mut engine = Engine::new(EngineConfig::default());
        engine.add_scene("world", SceneSpace::World).expect("world");
        engine.add_scene("hud", SceneSpace::Screen).expect("hud");
        let tile = engine
            .add_entity(
                "world",
                None,
                Entity::new("tile")
                    .with_component(PointerTarget::new(Rect::centered(Vec2::ZERO, Vec2::splat(4.0)))),
            )
            .expect("tile");
        let button = engine
            .add_entity(
                "hud",
                None,
                Entity::new("button").with_component(PointerTarget::new(Rect::new(
                    40.0, 40.0, 20.0, 20.0,
                ))),
            )
            .expect("button");

        let mut surface = RecordingSurface::new(100, 100);
        engine.push_input(RawInput::PointerMoved(Vec2::new(50.0, 50.0)));
        engine.tick(0.016, &mut surface);
        assert_eq!(engine.hovered("hud"), Some(button));
        assert_eq!(engine.hovered("world"), None);

        engine.push_input(RawInput::PointerMoved(Vec2::new(30.0, 50.0)));
        engine.tick(0.016, &mut surface);
        assert_eq!(engine.hovered("hud"), None);
        assert_eq!(engine.hovered("world"), Some(tile));
    }

    #[test]
    fn waiting_for_images_defers_render_until_loads_finish() {
        let temp = TempDir::new().expect("temp");
        image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]))
            .save(temp.path().join("dot.png"))
            .expect("png");

        struct Picture;
        impl Component for Picture {
            fn queue_render_commands(&self, _ctx: &RenderContext<'_>, queue: &mut RenderQueue) {
                queue.image("dot", Rect::new(0.0, 0.0, 1.0, 1.0), Style::default());
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        let mut engine = Engine::new(EngineConfig {
            wait_for_images: true,
            asset_root: Some(temp.path().to_path_buf()),
            ..EngineConfig::default()
        });
        engine.add_scene("world", SceneSpace::World).expect("scene");
        engine
            .add_entity("world", None, Entity::new("picture").with_component(Picture))
            .expect("picture");

        let mut surface = RecordingSurface::new(32, 32);
        let first = engine.tick(0.016, &mut surface);
        assert!(!first.rendered);
        assert!(first.waiting_for_images);
        assert!(surface.calls().is_empty());

        let mut rendered = false;
        for _ in 0..2_000 {
            if engine.tick(0.0, &mut surface).rendered {
                rendered = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert!(rendered);
        assert!(surface
            .calls()
            .iter()
            .any(|call| matches!(call, DrawCall::Image { size: (2, 2), .. })));
    }
}
