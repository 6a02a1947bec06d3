use std::sync::{Arc, Weak};

use ogre_frame::{ByteOrder, EntityFrame, PayloadReader, PayloadWriter};
use ogre_registry::{LazyClearable, LazyLink, ObjectLoader, ObjectRef};
use ogre_types::Oid;

use crate::descriptor::FieldDescriptor;
use crate::error::HandlerResult;

/// Services a handler may call while storing an instance.
pub trait StoreContext {
    /// OID of `referent`, assigning one and queueing it for storage if it
    /// has never been seen. The OID is registered before anything recurses.
    fn apply(&mut self, referent: &ObjectRef) -> HandlerResult<Oid>;

    /// Bind `lazy` to `oid` once the records of this store are written.
    /// A store that fails leaves the lazy untouched.
    fn link_lazy(&mut self, lazy: Arc<dyn LazyLink>, oid: Oid);
}

/// Services a handler may call while loading an instance.
pub trait LoadContext {
    fn byte_order(&self) -> ByteOrder;

    /// Resolve a reference. Valid once the referent's shell exists.
    fn lookup_object(&self, oid: Oid) -> HandlerResult<ObjectRef>;

    /// The instance for `oid` if it is already materialized.
    fn peek_object(&self, oid: Oid) -> Option<ObjectRef>;

    fn loader(&self) -> Arc<dyn ObjectLoader>;

    /// Hand a linked lazy to the idle-clearing manager, if any.
    fn track_lazy(&self, lazy: Weak<dyn LazyClearable>);

    fn reader<'a>(&self, record: &EntityFrame<'a>) -> PayloadReader<'a> {
        PayloadReader::new(self.byte_order(), record.payload())
            .with_base_offset(record.offset + ogre_frame::ENTITY_HEADER_LEN)
    }
}

/// Flattens and rebuilds instances of one type.
///
/// Loading runs in three passes over the whole closure: [`create`](Self::create)
/// builds a shell from construction fields without resolving references,
/// [`update`](Self::update) fills references once every shell exists, and
/// [`complete`](Self::complete) runs after every update.
pub trait TypeHandler: Send + Sync {
    /// Stable name recorded in the type dictionary.
    fn type_name(&self) -> &str;

    /// The Rust type this handler stores.
    fn rust_type(&self) -> std::any::TypeId;

    fn fields(&self) -> &[FieldDescriptor];

    fn has_references(&self) -> bool {
        self.fields().iter().any(|f| f.kind.is_reference())
    }

    fn has_variable_length(&self) -> bool {
        self.fields().iter().any(|f| f.kind.fixed_width().is_none())
    }

    /// Whether two instances may encode to different lengths.
    fn has_varying_instance_length(&self) -> bool {
        self.has_variable_length()
    }

    fn store(
        &self,
        out: &mut PayloadWriter,
        instance: &ObjectRef,
        oid: Oid,
        ctx: &mut dyn StoreContext,
    ) -> HandlerResult<()>;

    fn create(&self, record: &EntityFrame<'_>, ctx: &dyn LoadContext) -> HandlerResult<ObjectRef>;

    fn update(
        &self,
        record: &EntityFrame<'_>,
        instance: &ObjectRef,
        ctx: &dyn LoadContext,
    ) -> HandlerResult<()>;

    fn complete(
        &self,
        _record: &EntityFrame<'_>,
        _instance: &ObjectRef,
        _ctx: &dyn LoadContext,
    ) -> HandlerResult<()> {
        Ok(())
    }

    /// Visit the live referents `store` would apply.
    fn iterate_instance_references(
        &self,
        instance: &ObjectRef,
        visit: &mut dyn FnMut(&ObjectRef),
    ) -> HandlerResult<()>;

    /// Visit the non-null eager references of a record. Lazy OIDs are excluded.
    fn iterate_persisted_references(
        &self,
        record: &EntityFrame<'_>,
        order: ByteOrder,
        visit: &mut dyn FnMut(Oid),
    ) -> HandlerResult<()>;
}
