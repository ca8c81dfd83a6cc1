use crate::argument_cache::canonical_type_name;
use crate::host::{EntityHandle, Host};
use crate::reflect::{TypeBuilder, TypeInfo, ENTITY_TYPE_NAME};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Default)]
struct Slot {
    generation: u32,
    alive: bool,
    ty: Option<Rc<TypeInfo>>,
}

/// A minimal entity host: generational entity slots plus a registry of entity types.
///
/// Despawning bumps the slot generation, so stale handles stop being alive without the handle
/// itself changing.
pub struct World {
    slots: Vec<Slot>,
    free: Vec<u32>,
    types: HashMap<String, Rc<TypeInfo>>,
    root: Rc<TypeInfo>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        let root = TypeBuilder::new(ENTITY_TYPE_NAME).build();
        let mut types = HashMap::new();
        types.insert(root.name().to_string(), Rc::clone(&root));
        Self { slots: Vec::new(), free: Vec::new(), types, root }
    }

    /// The type every registered entity type derives from.
    pub fn entity_type(&self) -> &Rc<TypeInfo> {
        &self.root
    }

    /// Registers a type, parenting it to the root entity type when it names no base.
    /// Re-registering a name replaces the previous definition for future lookups.
    pub fn register_type(&mut self, builder: TypeBuilder) -> Rc<TypeInfo> {
        let builder = if builder.has_base() { builder } else { builder.extends(&self.root) };
        let ty = builder.build();
        self.types.insert(ty.name().to_string(), Rc::clone(&ty));
        ty
    }

    pub fn spawn(&mut self, ty: &Rc<TypeInfo>) -> EntityHandle {
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[id as usize];
        slot.alive = true;
        slot.ty = Some(Rc::clone(ty));
        EntityHandle::new(id, slot.generation)
    }

    pub fn despawn(&mut self, entity: EntityHandle) -> bool {
        match self.slots.get_mut(entity.id as usize) {
            Some(slot) if slot.alive && slot.generation == entity.generation => {
                slot.alive = false;
                slot.generation = slot.generation.wrapping_add(1);
                slot.ty = None;
                self.free.push(entity.id);
                true
            }
            _ => false,
        }
    }

    pub fn entity_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.alive).count()
    }

    fn slot(&self, entity: EntityHandle) -> Option<&Slot> {
        self.slots.get(entity.id as usize).filter(|slot| slot.alive && slot.generation == entity.generation)
    }
}

impl Host for World {
    fn is_alive(&self, entity: EntityHandle) -> bool {
        self.slot(entity).is_some()
    }

    fn type_of(&self, entity: EntityHandle) -> Option<Rc<TypeInfo>> {
        self.slot(entity).and_then(|slot| slot.ty.clone())
    }

    fn resolve_type(&self, type_name: &str) -> Option<Rc<TypeInfo>> {
        self.types.get(&canonical_type_name(type_name)).cloned()
    }
}
