use std::cell::Cell;

use glam::{Affine2, Vec2};

use super::camera::Camera;
use super::component::{
    Component, ComponentId, ComponentSlot, FrameInfo, RenderContext, UpdateContext,
};
use super::rendering::{RenderQueue, Viewport};
use super::transform::Transform;
use crate::EngineError;

/// Generation-checked handle into a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

/// A scene-graph node: one transform, ordered components, ordered children.
pub struct Entity {
    name: String,
    transform: Transform,
    components: Vec<ComponentSlot>,
    behavior: Option<Box<dyn Component>>,
    children: Vec<EntityId>,
    parent: Option<EntityId>,
    enabled: bool,
    z_index: i32,
    order: u64,
    children_order_dirty: bool,
    components_order_dirty: bool,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            components: Vec::new(),
            behavior: None,
            children: Vec::new(),
            parent: None,
            enabled: true,
            z_index: 0,
            order: 0,
            children_order_dirty: false,
            components_order_dirty: false,
        }
    }

    pub fn with_position(mut self, position: Vec2) -> Self {
        self.transform.set_position(position);
        self
    }

    pub fn with_rotation_degrees(mut self, rotation_degrees: f32) -> Self {
        self.transform.set_rotation_degrees(rotation_degrees);
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.transform.set_scale(scale);
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_component<C: Component>(self, component: C) -> Self {
        self.with_component_z(component, 0)
    }

    pub fn with_component_z<C: Component>(mut self, component: C, z_index: i32) -> Self {
        self.components.push(ComponentSlot {
            id: ComponentId(0),
            z_index,
            enabled: true,
            component: Some(Box::new(component)),
        });
        self.components_order_dirty = true;
        self
    }

    /// Entity-level update hook; runs after the entity's children.
    pub fn with_behavior<C: Component>(mut self, behavior: C) -> Self {
        self.behavior = Some(Box::new(behavior));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    fn sort_key(&self) -> (i32, u64) {
        (self.z_index, self.order)
    }
}

struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Arena-backed entity tree with one root.
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: EntityId,
    next_order: u64,
    next_component_id: u64,
    live_count: usize,
    pending_render: bool,
    world_recomputes: Cell<u64>,
}

impl SceneGraph {
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut graph = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: EntityId {
                index: 0,
                generation: 0,
            },
            next_order: 0,
            next_component_id: 0,
            live_count: 0,
            pending_render: true,
            world_recomputes: Cell::new(0),
        };
        graph.root = graph.insert_slot(Entity::new(root_name));
        graph
    }

    pub fn root(&self) -> EntityId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.live_count
    }

    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entity.as_ref())
    }

    fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entity.as_mut())
    }

    fn insert_slot(&mut self, mut entity: Entity) -> EntityId {
        entity.order = self.next_order;
        self.next_order = self.next_order.saturating_add(1);
        for slot in &mut entity.components {
            slot.id = ComponentId(self.next_component_id);
            self.next_component_id = self.next_component_id.saturating_add(1);
        }
        self.live_count += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entity = Some(entity);
            EntityId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entity: Some(entity),
            });
            EntityId {
                index,
                generation: 0,
            }
        }
    }

    pub fn add_child(&mut self, parent: EntityId, mut entity: Entity) -> Result<EntityId, EngineError> {
        if !self.contains(parent) {
            return Err(EngineError::MissingEntity(parent));
        }
        entity.parent = Some(parent);
        entity.children.clear();
        entity.transform.mark_world_dirty();
        let id = self.insert_slot(entity);
        if let Some(parent_entity) = self.get_mut(parent) {
            parent_entity.children.push(id);
            parent_entity.children_order_dirty = true;
        }
        self.pending_render = true;
        Ok(id)
    }

    /// Removes the entity and its whole subtree. The root cannot be removed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        if id == self.root || !self.contains(id) {
            return false;
        }
        if let Some(parent) = self.get(id).and_then(Entity::parent) {
            if let Some(parent_entity) = self.get_mut(parent) {
                parent_entity.children.retain(|child| *child != id);
            }
        }
        let mut doomed = vec![id];
        while let Some(next) = doomed.pop() {
            let Some(slot) = self.slots.get_mut(next.index as usize) else {
                continue;
            };
            if slot.generation != next.generation {
                continue;
            }
            if let Some(entity) = slot.entity.take() {
                doomed.extend(entity.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(next.index);
                self.live_count -= 1;
            }
        }
        self.pending_render = true;
        true
    }

    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.get(id).map(Entity::children).unwrap_or(&[])
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.get(id).and_then(Entity::parent)
    }

    pub fn set_enabled(&mut self, id: EntityId, enabled: bool) -> bool {
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        if entity.enabled == enabled {
            return false;
        }
        entity.enabled = enabled;
        self.pending_render = true;
        true
    }

    pub fn is_enabled(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(Entity::is_enabled)
    }

    /// Enabled itself and through every ancestor.
    pub fn is_active(&self, id: EntityId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.get(current) {
                Some(entity) if entity.enabled => cursor = entity.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn set_z_index(&mut self, id: EntityId, z_index: i32) {
        let Some(entity) = self.get_mut(id) else {
            return;
        };
        if entity.z_index == z_index {
            return;
        }
        entity.z_index = z_index;
        if let Some(parent) = entity.parent {
            if let Some(parent_entity) = self.get_mut(parent) {
                parent_entity.children_order_dirty = true;
            }
        }
        self.pending_render = true;
    }

    pub fn transform(&self, id: EntityId) -> Option<&Transform> {
        self.get(id).map(Entity::transform)
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) -> bool {
        let changed = self
            .get_mut(id)
            .is_some_and(|entity| entity.transform.set_position(position));
        self.after_transform_change(id, changed)
    }

    pub fn set_rotation_degrees(&mut self, id: EntityId, rotation_degrees: f32) -> bool {
        let changed = self
            .get_mut(id)
            .is_some_and(|entity| entity.transform.set_rotation_degrees(rotation_degrees));
        self.after_transform_change(id, changed)
    }

    pub fn set_scale(&mut self, id: EntityId, scale: Vec2) -> bool {
        let changed = self
            .get_mut(id)
            .is_some_and(|entity| entity.transform.set_scale(scale));
        self.after_transform_change(id, changed)
    }

    fn after_transform_change(&mut self, id: EntityId, changed: bool) -> bool {
        if changed {
            self.mark_descendants_world_dirty(id);
            self.pending_render = true;
        }
        changed
    }

    fn mark_descendants_world_dirty(&self, id: EntityId) {
        let Some(entity) = self.get(id) else {
            return;
        };
        for &child in &entity.children {
            let Some(child_entity) = self.get(child) else {
                continue;
            };
            // A dirty node's descendants are already dirty: a clean node
            // always has clean ancestors.
            if child_entity.transform.is_world_dirty() {
                continue;
            }
            child_entity.transform.mark_world_dirty();
            self.mark_descendants_world_dirty(child);
        }
    }

    pub fn local_matrix(&self, id: EntityId) -> Affine2 {
        self.get(id)
            .map(|entity| entity.transform.local_matrix())
            .unwrap_or(Affine2::IDENTITY)
    }

    /// `parent.world · local`, recomputed only when dirty.
    pub fn world_matrix(&self, id: EntityId) -> Affine2 {
        let Some(entity) = self.get(id) else {
            return Affine2::IDENTITY;
        };
        let transform = &entity.transform;
        if !transform.is_world_dirty() {
            return transform.cached_world();
        }
        let local = transform.local_matrix();
        let world = match entity.parent {
            Some(parent) => self.world_matrix(parent) * local,
            None => local,
        };
        transform.store_world(world);
        self.world_recomputes.set(self.world_recomputes.get() + 1);
        world
    }

    pub fn world_position(&self, id: EntityId) -> Vec2 {
        self.world_matrix(id).translation
    }

    pub fn world_recompute_count(&self) -> u64 {
        self.world_recomputes.get()
    }

    pub fn add_component<C: Component>(
        &mut self,
        id: EntityId,
        component: C,
    ) -> Result<ComponentId, EngineError> {
        self.add_component_z(id, component, 0)
    }

    pub fn add_component_z<C: Component>(
        &mut self,
        id: EntityId,
        component: C,
        z_index: i32,
    ) -> Result<ComponentId, EngineError> {
        let component_id = ComponentId(self.next_component_id);
        let entity = self.get_mut(id).ok_or(EngineError::MissingEntity(id))?;
        entity.components.push(ComponentSlot {
            id: component_id,
            z_index,
            enabled: true,
            component: Some(Box::new(component)),
        });
        entity.components_order_dirty = true;
        self.next_component_id = self.next_component_id.saturating_add(1);
        self.pending_render = true;
        Ok(component_id)
    }

    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> bool {
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        let before = entity.components.len();
        entity.components.retain(|slot| !slot.is::<T>());
        let removed = entity.components.len() != before;
        self.pending_render |= removed;
        removed
    }

    pub fn component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.get(id)?.components.iter().find_map(|slot| {
            slot.component
                .as_deref()
                .and_then(|component| component.as_any().downcast_ref::<T>())
        })
    }

    /// Like [`Self::component`], skipping disabled slots.
    pub fn enabled_component<T: Component>(&self, id: EntityId) -> Option<&T> {
        self.get(id)?
            .components
            .iter()
            .filter(|slot| slot.enabled)
            .find_map(|slot| {
                slot.component
                    .as_deref()
                    .and_then(|component| component.as_any().downcast_ref::<T>())
            })
    }

    pub fn component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.get_mut(id)?.components.iter_mut().find_map(|slot| {
            slot.component
                .as_deref_mut()
                .and_then(|component| component.as_any_mut().downcast_mut::<T>())
        })
    }

    pub fn require_component<T: Component>(&self, id: EntityId) -> Result<&T, EngineError> {
        self.component::<T>(id)
            .ok_or_else(|| EngineError::MissingComponent {
                entity: id,
                type_name: std::any::type_name::<T>(),
            })
    }

    pub fn set_component_enabled<T: Component>(&mut self, id: EntityId, enabled: bool) -> bool {
        let Some(entity) = self.get_mut(id) else {
            return false;
        };
        let mut changed = false;
        for slot in entity.components.iter_mut().filter(|slot| slot.is::<T>()) {
            changed |= slot.enabled != enabled;
            slot.enabled = enabled;
        }
        self.pending_render |= changed;
        changed
    }

    /// Marks the graph as needing a render even though no tracked value changed.
    pub fn request_render(&mut self) {
        self.pending_render = true;
    }

    pub(crate) fn take_pending_render(&mut self) -> bool {
        std::mem::take(&mut self.pending_render)
    }

    /// Updates the whole tree; returns whether anything changed.
    pub fn update(&mut self, frame: FrameInfo) -> bool {
        let root = self.root;
        self.update_entity(root, frame)
    }

    fn update_entity(&mut self, id: EntityId, frame: FrameInfo) -> bool {
        let component_ids: Vec<ComponentId> = match self.get(id) {
            Some(entity) if entity.enabled => entity
                .components
                .iter()
                .filter(|slot| slot.enabled)
                .map(|slot| slot.id)
                .collect(),
            _ => return false,
        };

        let mut changed = false;
        for component_id in component_ids {
            let Some(mut component) = self.take_component(id, component_id) else {
                continue;
            };
            let mut ctx = UpdateContext {
                entity: id,
                graph: self,
                frame,
            };
            changed |= component.update(&mut ctx);
            self.restore_component(id, component_id, component);
        }

        let children = self.children(id).to_vec();
        for child in children {
            changed |= self.update_entity(child, frame);
        }

        if let Some(mut behavior) = self.get_mut(id).and_then(|entity| entity.behavior.take()) {
            let mut ctx = UpdateContext {
                entity: id,
                graph: self,
                frame,
            };
            changed |= behavior.update(&mut ctx);
            if let Some(entity) = self.get_mut(id) {
                entity.behavior.get_or_insert(behavior);
            }
        }
        changed
    }

    fn take_component(
        &mut self,
        id: EntityId,
        component_id: ComponentId,
    ) -> Option<Box<dyn Component>> {
        self.get_mut(id)?
            .components
            .iter_mut()
            .find(|slot| slot.id == component_id)?
            .component
            .take()
    }

    fn restore_component(
        &mut self,
        id: EntityId,
        component_id: ComponentId,
        component: Box<dyn Component>,
    ) {
        // Dropped when the entity or the slot went away during the update.
        if let Some(slot) = self
            .get_mut(id)
            .and_then(|entity| entity.components.iter_mut().find(|slot| slot.id == component_id))
        {
            slot.component = Some(component);
        }
    }

    /// Applies deferred `(z_index, insertion order)` sorts.
    pub fn sort_pending(&mut self) {
        for index in 0..self.slots.len() {
            let Some(entity) = self.slots[index].entity.as_mut() else {
                continue;
            };
            if entity.components_order_dirty {
                entity.components.sort_by_key(ComponentSlot::sort_key);
                entity.components_order_dirty = false;
            }
            if !entity.children_order_dirty {
                continue;
            }
            entity.children_order_dirty = false;
            let mut keyed: Vec<((i32, u64), EntityId)> = entity
                .children
                .clone()
                .into_iter()
                .filter_map(|child| self.get(child).map(|c| (c.sort_key(), child)))
                .collect();
            keyed.sort_by_key(|(key, _)| *key);
            if let Some(entity) = self.slots[index].entity.as_mut() {
                entity.children = keyed.into_iter().map(|(_, child)| child).collect();
            }
        }
    }

    /// Pre-order emission: push local matrix, negative-z children, own
    /// components, non-negative-z children, pop. Call [`Self::sort_pending`]
    /// first.
    pub fn queue_render_commands(&self, camera: &Camera, viewport: Viewport, queue: &mut RenderQueue) {
        self.emit(self.root, camera, viewport, queue);
    }

    fn emit(&self, id: EntityId, camera: &Camera, viewport: Viewport, queue: &mut RenderQueue) {
        let Some(entity) = self.get(id) else {
            return;
        };
        if !entity.enabled {
            return;
        }
        queue.push_transform(entity.transform.local_matrix());
        let split = self.foreground_split(entity);
        for &child in &entity.children[..split] {
            self.emit(child, camera, viewport, queue);
        }
        let ctx = RenderContext {
            entity: id,
            graph: self,
            camera,
            viewport,
        };
        for slot in entity.components.iter().filter(|slot| slot.enabled) {
            if let Some(component) = slot.component.as_deref() {
                component.queue_render_commands(&ctx, queue);
            }
        }
        if let Some(behavior) = entity.behavior.as_deref() {
            behavior.queue_render_commands(&ctx, queue);
        }
        for &child in &entity.children[split..] {
            self.emit(child, camera, viewport, queue);
        }
        queue.pop_transform();
    }

    fn foreground_split(&self, entity: &Entity) -> usize {
        entity
            .children
            .iter()
            .position(|child| self.get(*child).is_some_and(|c| c.z_index >= 0))
            .unwrap_or(entity.children.len())
    }

    /// Enabled entities in the order their components draw (bottom first).
    pub fn render_order(&self) -> Vec<EntityId> {
        let mut order = Vec::new();
        self.collect_render_order(self.root, &mut order);
        order
    }

    fn collect_render_order(&self, id: EntityId, order: &mut Vec<EntityId>) {
        let Some(entity) = self.get(id) else {
            return;
        };
        if !entity.enabled {
            return;
        }
        let split = self.foreground_split(entity);
        for &child in &entity.children[..split] {
            self.collect_render_order(child, order);
        }
        order.push(id);
        for &child in &entity.children[split..] {
            self.collect_render_order(child, order);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::app::rendering::{Color, Rect, RenderCommand, Style};

    struct Marker(u8);

    impl Component for Marker {
        fn queue_render_commands(&self, _ctx: &RenderContext<'_>, queue: &mut RenderQueue) {
            queue.rect(
                Rect::new(self.0 as f32, 0.0, 1.0, 1.0),
                Style::fill(Color::WHITE),
            );
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct Counter {
        ticks: u32,
        log: std::rc::Rc<std::cell::RefCell<Vec<&'static str>>>,
        label: &'static str,
    }

    impl Component for Counter {
        fn update(&mut self, _ctx: &mut UpdateContext<'_>) -> bool {
            self.ticks += 1;
            self.log.borrow_mut().push(self.label);
            true
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn marker_order(queue: &RenderQueue) -> Vec<u8> {
        queue
            .commands()
            .iter()
            .filter_map(|command| match command {
                RenderCommand::Rect { rect, .. } => Some(rect.x as u8),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn root_move_reaches_every_descendant_on_next_read() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let a = graph
            .add_child(root, Entity::new("a").with_position(Vec2::new(1.0, 0.0)))
            .expect("a");
        let a1 = graph
            .add_child(a, Entity::new("a1").with_position(Vec2::new(0.0, 1.0)))
            .expect("a1");
        assert_eq!(graph.world_position(a1), Vec2::new(1.0, 1.0));

        graph.set_position(root, Vec2::new(10.0, 10.0));
        assert_eq!(graph.world_position(a), Vec2::new(11.0, 10.0));
        assert_eq!(graph.world_position(a1), Vec2::new(11.0, 11.0));
    }

    #[test]
    fn moving_one_subtree_leaves_sibling_caches_intact() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let a = graph.add_child(root, Entity::new("a")).expect("a");
        let a1 = graph.add_child(a, Entity::new("a1")).expect("a1");
        let b = graph.add_child(root, Entity::new("b")).expect("b");
        let b1 = graph.add_child(b, Entity::new("b1")).expect("b1");
        for id in [root, a, a1, b, b1] {
            let _ = graph.world_matrix(id);
        }
        let before = graph.world_recompute_count();

        graph.set_position(a, Vec2::new(3.0, 0.0));
        for id in [root, a, a1, b, b1] {
            let _ = graph.world_matrix(id);
        }
        assert_eq!(graph.world_recompute_count() - before, 2);

        for id in [root, a, a1, b, b1] {
            let _ = graph.world_matrix(id);
        }
        assert_eq!(graph.world_recompute_count() - before, 2);
    }

    #[test]
    fn rotation_and_scale_compose_through_parent() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let parent = graph
            .add_child(
                root,
                Entity::new("parent")
                    .with_rotation_degrees(90.0)
                    .with_scale(Vec2::splat(2.0)),
            )
            .expect("parent");
        let child = graph
            .add_child(parent, Entity::new("child").with_position(Vec2::new(1.0, 0.0)))
            .expect("child");
        let position = graph.world_position(child);
        assert!((position - Vec2::new(0.0, 2.0)).length() < 1e-4, "{position:?}");
    }

    #[test]
    fn negative_z_children_draw_before_components_and_foreground_after() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let parent = graph
            .add_child(root, Entity::new("parent").with_component(Marker(100)))
            .expect("parent");
        for z in [2, -1, 0, -2, 1] {
            graph
                .add_child(
                    parent,
                    Entity::new(format!("child{z}"))
                        .with_z_index(z)
                        .with_component(Marker((z + 10) as u8)),
                )
                .expect("child");
        }
        graph.sort_pending();

        let mut queue = RenderQueue::default();
        graph.queue_render_commands(&Camera::default(), Viewport::new(100, 100), &mut queue);
        assert_eq!(marker_order(&queue), vec![8, 9, 100, 10, 11, 12]);
    }

    #[test]
    fn equal_z_children_keep_insertion_order() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        for marker in [5u8, 3, 4] {
            graph
                .add_child(root, Entity::new("child").with_component(Marker(marker)))
                .expect("child");
        }
        graph.sort_pending();
        let mut queue = RenderQueue::default();
        graph.queue_render_commands(&Camera::default(), Viewport::new(10, 10), &mut queue);
        assert_eq!(marker_order(&queue), vec![5, 3, 4]);
    }

    #[test]
    fn every_entity_push_is_balanced_by_a_pop() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let a = graph.add_child(root, Entity::new("a")).expect("a");
        graph.add_child(a, Entity::new("b").with_z_index(-3)).expect("b");
        graph.sort_pending();
        let mut queue = RenderQueue::default();
        graph.queue_render_commands(&Camera::default(), Viewport::new(10, 10), &mut queue);
        let pushes = queue
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::PushTransform(_)))
            .count();
        let pops = queue
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::PopTransform))
            .count();
        assert_eq!(pushes, 3);
        assert_eq!(pops, 3);
    }

    #[test]
    fn disabled_entities_skip_update_and_render() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let hidden = graph
            .add_child(
                root,
                Entity::new("hidden")
                    .with_component(Counter {
                        ticks: 0,
                        log: log.clone(),
                        label: "hidden",
                    })
                    .with_component(Marker(1)),
            )
            .expect("hidden");
        graph.set_enabled(hidden, false);

        assert!(!graph.update(FrameInfo::default()));
        graph.sort_pending();
        let mut queue = RenderQueue::default();
        graph.queue_render_commands(&Camera::default(), Viewport::new(10, 10), &mut queue);
        assert!(marker_order(&queue).is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn update_runs_components_then_children_then_behavior() {
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let parent = graph
            .add_child(
                root,
                Entity::new("parent")
                    .with_component(Counter {
                        ticks: 0,
                        log: log.clone(),
                        label: "parent_component",
                    })
                    .with_behavior(Counter {
                        ticks: 0,
                        log: log.clone(),
                        label: "parent_behavior",
                    }),
            )
            .expect("parent");
        graph
            .add_child(
                parent,
                Entity::new("child").with_component(Counter {
                    ticks: 0,
                    log: log.clone(),
                    label: "child_component",
                }),
            )
            .expect("child");

        assert!(graph.update(FrameInfo::default()));
        assert_eq!(
            *log.borrow(),
            vec!["parent_component", "child_component", "parent_behavior"]
        );
        assert_eq!(
            graph.component::<Counter>(parent).expect("counter").ticks,
            1
        );
    }

    #[test]
    fn removed_ids_go_stale_and_slots_are_reused_with_new_generation() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let a = graph.add_child(root, Entity::new("a")).expect("a");
        let a1 = graph.add_child(a, Entity::new("a1")).expect("a1");
        assert_eq!(graph.len(), 3);

        assert!(graph.remove(a));
        assert!(!graph.contains(a));
        assert!(!graph.contains(a1));
        assert_eq!(graph.len(), 1);
        assert!(graph.children(root).is_empty());

        let b = graph.add_child(root, Entity::new("b")).expect("b");
        assert_ne!(a, b);
        assert!(!graph.contains(a));
        assert!(!graph.remove(root));
    }

    #[test]
    fn add_child_to_missing_parent_is_an_error() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let a = graph.add_child(root, Entity::new("a")).expect("a");
        graph.remove(a);
        let err = graph.add_child(a, Entity::new("orphan")).expect_err("missing parent");
        assert!(matches!(err, EngineError::MissingEntity(id) if id == a));
    }

    #[test]
    fn require_component_reports_missing_type() {
        let graph = SceneGraph::new("root");
        let err = graph
            .require_component::<Marker>(graph.root())
            .err()
            .expect("missing");
        assert!(matches!(err, EngineError::MissingComponent { .. }));
    }

    #[test]
    fn render_order_matches_emission_order() {
        let mut graph = SceneGraph::new("root");
        let root = graph.root();
        let front = graph.add_child(root, Entity::new("front").with_z_index(1)).expect("front");
        let back = graph.add_child(root, Entity::new("back").with_z_index(-1)).expect("back");
        graph.sort_pending();
        assert_eq!(graph.render_order(), vec![back, root, front]);
    }
}
