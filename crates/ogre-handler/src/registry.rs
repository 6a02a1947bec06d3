use std::any::{Any, TypeId as RustTypeId};
use std::collections::HashMap;
use std::sync::Arc;

use ogre_registry::ObjectRef;
use ogre_types::{Oid, TypeId};
use tracing::debug;

use crate::builtin::{I64ListHandler, ObjectListHandler, StringHandler};
use crate::descriptor::TypeDescriptor;
use crate::dictionary::TypeDictionary;
use crate::error::{HandlerError, HandlerResult};
use crate::traits::TypeHandler;

/// A handler bound to its persisted type id.
#[derive(Clone)]
pub struct RegisteredHandler {
    pub type_id: TypeId,
    pub handler: Arc<dyn TypeHandler>,
}

/// Maps Rust types and persisted type ids to handlers.
///
/// Built once against the persisted [`TypeDictionary`] and then shared
/// read-only. Registering a type whose name is already in the dictionary
/// reuses its id and requires an identical field layout.
pub struct TypeHandlerRegistry {
    dictionary: TypeDictionary,
    by_rust_type: HashMap<RustTypeId, RegisteredHandler>,
    by_type_id: HashMap<TypeId, RegisteredHandler>,
    next_type_id: TypeId,
    added: usize,
}

impl TypeHandlerRegistry {
    /// A registry over `dictionary` with the built-in handlers registered.
    pub fn new(dictionary: TypeDictionary) -> HandlerResult<Self> {
        let next_type_id = dictionary
            .highest_type_id()
            .map(TypeId::next)
            .filter(|id| *id > TypeId::FIRST_CUSTOM)
            .unwrap_or(TypeId::FIRST_CUSTOM);
        let mut registry = Self {
            dictionary,
            by_rust_type: HashMap::new(),
            by_type_id: HashMap::new(),
            next_type_id,
            added: 0,
        };
        registry.register(StringHandler::new())?;
        registry.register(I64ListHandler::new())?;
        registry.register(ObjectListHandler::new())?;
        Ok(registry)
    }

    pub fn register(&mut self, handler: impl TypeHandler + 'static) -> HandlerResult<TypeId> {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn TypeHandler>) -> HandlerResult<TypeId> {
        let name = handler.type_name().to_string();
        if self.by_rust_type.contains_key(&handler.rust_type())
            || self.by_type_id.values().any(|r| r.handler.type_name() == name)
        {
            return Err(HandlerError::DuplicateType { type_name: name });
        }

        let type_id = match self.dictionary.by_name(&name) {
            Some(persisted) => {
                persisted.check_fields(handler.fields())?;
                persisted.type_id
            }
            None => {
                let type_id = self.next_type_id;
                self.dictionary
                    .insert(TypeDescriptor::new(type_id, name.clone(), handler.fields().to_vec()))?;
                self.next_type_id = type_id.next();
                self.added += 1;
                type_id
            }
        };

        let registered = RegisteredHandler { type_id, handler };
        self.by_rust_type
            .insert(registered.handler.rust_type(), registered.clone());
        self.by_type_id.insert(type_id, registered);
        debug!(type_name = %name, %type_id, "registered type handler");
        Ok(type_id)
    }

    /// Handler for a live instance, by its concrete Rust type.
    pub fn handler_for_instance(&self, instance: &ObjectRef) -> HandlerResult<&RegisteredHandler> {
        let rust_type = (**instance).type_id();
        self.by_rust_type
            .get(&rust_type)
            .ok_or_else(|| HandlerError::NoHandlerForType {
                rust_type: format!("{rust_type:?}"),
            })
    }

    /// Handler for a persisted record.
    pub fn handler_for_type_id(&self, type_id: TypeId, oid: Oid) -> HandlerResult<&RegisteredHandler> {
        self.by_type_id
            .get(&type_id)
            .ok_or(HandlerError::UnknownTypeId { type_id, oid })
    }

    pub fn type_id_of<T: Any>(&self) -> Option<TypeId> {
        self.by_rust_type
            .get(&RustTypeId::of::<T>())
            .map(|r| r.type_id)
    }

    pub fn descriptor(&self, type_id: TypeId) -> Option<&TypeDescriptor> {
        self.dictionary.get(type_id)
    }

    pub fn dictionary(&self) -> &TypeDictionary {
        &self.dictionary
    }

    /// `true` if registration added types the persisted dictionary lacked.
    pub fn is_dictionary_dirty(&self) -> bool {
        self.added > 0
    }

    pub fn len(&self) -> usize {
        self.by_type_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type_id.is_empty()
    }
}

impl std::fmt::Debug for TypeHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandlerRegistry")
            .field("handlers", &self.by_type_id.len())
            .field("next_type_id", &self.next_type_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::ObjectList;
    use crate::descriptor::{FieldDescriptor, FieldKind};
    use crate::entity::EntityHandlerBuilder;
    use ogre_registry::erase;

    #[derive(Default)]
    struct Point {
        x: f64,
        y: f64,
    }

    fn point_handler() -> crate::entity::EntityHandler<Point> {
        EntityHandlerBuilder::new("app.Point", Point::default)
            .field("x", |p: &Point| p.x, |p, v| p.x = v)
            .field("y", |p: &Point| p.y, |p, v| p.y = v)
            .build()
    }

    #[test]
    fn builtins_are_registered() {
        let registry = TypeHandlerRegistry::new(TypeDictionary::new()).unwrap();
        assert_eq!(registry.len(), 3);
        assert!(registry.type_id_of::<String>().is_some());
        assert!(registry.type_id_of::<Vec<i64>>().is_some());
        let list = erase(Arc::new(ObjectList::new()));
        assert_eq!(
            registry.handler_for_instance(&list).unwrap().handler.type_name(),
            ObjectListHandler::TYPE_NAME
        );
        assert!(registry.is_dictionary_dirty());
    }

    #[test]
    fn new_types_get_fresh_ids() {
        let mut registry = TypeHandlerRegistry::new(TypeDictionary::new()).unwrap();
        let id = registry.register(point_handler()).unwrap();
        assert!(id >= TypeId::FIRST_CUSTOM);
        assert_eq!(registry.descriptor(id).unwrap().type_name, "app.Point");
        assert_eq!(registry.type_id_of::<Point>(), Some(id));
    }

    #[test]
    fn persisted_ids_are_reused() {
        let mut first = TypeHandlerRegistry::new(TypeDictionary::new()).unwrap();
        let id = first.register(point_handler()).unwrap();
        let persisted = TypeDictionary::parse(&first.dictionary().assemble()).unwrap();

        let mut second = TypeHandlerRegistry::new(persisted).unwrap();
        assert_eq!(second.register(point_handler()).unwrap(), id);
        assert!(!second.is_dictionary_dirty());
    }

    #[test]
    fn changed_layout_is_rejected() {
        let mut dictionary = TypeDictionary::new();
        dictionary
            .insert(TypeDescriptor::new(
                TypeId::new(2_000_000),
                "app.Point",
                vec![FieldDescriptor::new("x", FieldKind::F64)],
            ))
            .unwrap();
        let mut registry = TypeHandlerRegistry::new(dictionary).unwrap();
        assert!(matches!(
            registry.register(point_handler()),
            Err(HandlerError::DescriptorMismatch { .. })
        ));
    }

    #[test]
    fn ids_continue_after_persisted_maximum() {
        let mut dictionary = TypeDictionary::new();
        dictionary
            .insert(TypeDescriptor::new(TypeId::new(2_000_000), "app.Old", vec![]))
            .unwrap();
        let registry = TypeHandlerRegistry::new(dictionary).unwrap();
        assert_eq!(registry.type_id_of::<String>(), Some(TypeId::new(2_000_001)));
    }

    #[test]
    fn double_registration_and_unknown_lookups_fail() {
        let mut registry = TypeHandlerRegistry::new(TypeDictionary::new()).unwrap();
        registry.register(point_handler()).unwrap();
        assert!(matches!(
            registry.register(point_handler()),
            Err(HandlerError::DuplicateType { .. })
        ));
        assert!(matches!(
            registry.handler_for_instance(&erase(Arc::new(1_u8))),
            Err(HandlerError::NoHandlerForType { .. })
        ));
        assert!(matches!(
            registry.handler_for_type_id(TypeId::new(42), Oid::new(9)),
            Err(HandlerError::UnknownTypeId { oid, .. }) if oid == Oid::new(9)
        ));
    }
}
