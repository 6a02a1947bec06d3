//! Handlers shipped with every registry.
//!
//! All three are variable-length and share the list layout of
//! [`PayloadWriter::put_list`](ogre_frame::PayloadWriter::put_list).

use std::any::{type_name, Any, TypeId as RustTypeId};
use std::sync::{Arc, RwLock};

use ogre_frame::{ByteOrder, EntityFrame, PayloadReader, PayloadWriter};
use ogre_registry::{erase, ObjectRef};
use ogre_types::Oid;

use crate::descriptor::{FieldDescriptor, FieldKind};
use crate::error::{HandlerError, HandlerResult};
use crate::traits::{LoadContext, StoreContext, TypeHandler};

fn downcast<'a, T: Any>(instance: &'a ObjectRef, oid: Oid) -> HandlerResult<&'a T> {
    instance
        .downcast_ref::<T>()
        .ok_or(HandlerError::TypeMismatch {
            oid,
            expected: type_name::<T>(),
        })
}

/// Growable list of references to arbitrary entities.
#[derive(Default)]
pub struct ObjectList {
    items: RwLock<Vec<ObjectRef>>,
}

impl ObjectList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<ObjectRef>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    pub fn push(&self, item: ObjectRef) {
        self.items.write().expect("lock poisoned").push(item);
    }

    pub fn get(&self, index: usize) -> Option<ObjectRef> {
        self.items.read().expect("lock poisoned").get(index).cloned()
    }

    /// Copy of the current elements.
    pub fn snapshot(&self) -> Vec<ObjectRef> {
        self.items.read().expect("lock poisoned").clone()
    }

    pub fn replace(&self, items: Vec<ObjectRef>) {
        *self.items.write().expect("lock poisoned") = items;
    }

    pub fn len(&self) -> usize {
        self.items.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObjectList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectList").field("len", &self.len()).finish()
    }
}

/// `String` as a single text list.
pub struct StringHandler {
    fields: [FieldDescriptor; 1],
}

impl StringHandler {
    pub const TYPE_NAME: &'static str = "ogre.String";

    pub fn new() -> Self {
        Self {
            fields: [FieldDescriptor::new("value", FieldKind::Text)],
        }
    }
}

impl Default for StringHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeHandler for StringHandler {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn rust_type(&self) -> RustTypeId {
        RustTypeId::of::<String>()
    }

    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn store(
        &self,
        out: &mut PayloadWriter,
        instance: &ObjectRef,
        oid: Oid,
        _ctx: &mut dyn StoreContext,
    ) -> HandlerResult<()> {
        Ok(out.put_text(downcast::<String>(instance, oid)?)?)
    }

    fn create(&self, record: &EntityFrame<'_>, ctx: &dyn LoadContext) -> HandlerResult<ObjectRef> {
        let text = ctx.reader(record).get_text()?.to_owned();
        Ok(erase(Arc::new(text)))
    }

    fn update(&self, _: &EntityFrame<'_>, _: &ObjectRef, _: &dyn LoadContext) -> HandlerResult<()> {
        Ok(())
    }

    fn iterate_instance_references(&self, _: &ObjectRef, _: &mut dyn FnMut(&ObjectRef)) -> HandlerResult<()> {
        Ok(())
    }

    fn iterate_persisted_references(
        &self,
        _: &EntityFrame<'_>,
        _: ByteOrder,
        _: &mut dyn FnMut(Oid),
    ) -> HandlerResult<()> {
        Ok(())
    }
}

/// `Vec<i64>` as a number list.
pub struct I64ListHandler {
    fields: [FieldDescriptor; 1],
}

impl I64ListHandler {
    pub const TYPE_NAME: &'static str = "ogre.I64List";

    pub fn new() -> Self {
        Self {
            fields: [FieldDescriptor::new("values", FieldKind::I64List)],
        }
    }
}

impl Default for I64ListHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeHandler for I64ListHandler {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn rust_type(&self) -> RustTypeId {
        RustTypeId::of::<Vec<i64>>()
    }

    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn store(
        &self,
        out: &mut PayloadWriter,
        instance: &ObjectRef,
        oid: Oid,
        _ctx: &mut dyn StoreContext,
    ) -> HandlerResult<()> {
        Ok(out.put_i64_list(downcast::<Vec<i64>>(instance, oid)?)?)
    }

    fn create(&self, record: &EntityFrame<'_>, ctx: &dyn LoadContext) -> HandlerResult<ObjectRef> {
        let values = ctx.reader(record).get_i64_list()?;
        Ok(erase(Arc::new(values)))
    }

    fn update(&self, _: &EntityFrame<'_>, _: &ObjectRef, _: &dyn LoadContext) -> HandlerResult<()> {
        Ok(())
    }

    fn iterate_instance_references(&self, _: &ObjectRef, _: &mut dyn FnMut(&ObjectRef)) -> HandlerResult<()> {
        Ok(())
    }

    fn iterate_persisted_references(
        &self,
        _: &EntityFrame<'_>,
        _: ByteOrder,
        _: &mut dyn FnMut(Oid),
    ) -> HandlerResult<()> {
        Ok(())
    }
}

/// [`ObjectList`] as a reference list. Elements resolve during update.
pub struct ObjectListHandler {
    fields: [FieldDescriptor; 1],
}

impl ObjectListHandler {
    pub const TYPE_NAME: &'static str = "ogre.ObjectList";

    pub fn new() -> Self {
        Self {
            fields: [FieldDescriptor::new("items", FieldKind::RefList)],
        }
    }
}

impl Default for ObjectListHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeHandler for ObjectListHandler {
    fn type_name(&self) -> &str {
        Self::TYPE_NAME
    }

    fn rust_type(&self) -> RustTypeId {
        RustTypeId::of::<ObjectList>()
    }

    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn store(
        &self,
        out: &mut PayloadWriter,
        instance: &ObjectRef,
        oid: Oid,
        ctx: &mut dyn StoreContext,
    ) -> HandlerResult<()> {
        let list = downcast::<ObjectList>(instance, oid)?;
        let oids = list
            .snapshot()
            .iter()
            .map(|item| ctx.apply(item))
            .collect::<HandlerResult<Vec<Oid>>>()?;
        Ok(out.put_oid_list(&oids)?)
    }

    fn create(&self, _record: &EntityFrame<'_>, _ctx: &dyn LoadContext) -> HandlerResult<ObjectRef> {
        Ok(erase(Arc::new(ObjectList::new())))
    }

    fn update(
        &self,
        record: &EntityFrame<'_>,
        instance: &ObjectRef,
        ctx: &dyn LoadContext,
    ) -> HandlerResult<()> {
        let list = downcast::<ObjectList>(instance, record.oid())?;
        let items = ctx
            .reader(record)
            .get_oid_list()?
            .into_iter()
            .map(|oid| ctx.lookup_object(oid))
            .collect::<HandlerResult<Vec<_>>>()?;
        list.replace(items);
        Ok(())
    }

    fn iterate_instance_references(
        &self,
        instance: &ObjectRef,
        visit: &mut dyn FnMut(&ObjectRef),
    ) -> HandlerResult<()> {
        for item in downcast::<ObjectList>(instance, Oid::NULL)?.snapshot() {
            visit(&item);
        }
        Ok(())
    }

    fn iterate_persisted_references(
        &self,
        record: &EntityFrame<'_>,
        order: ByteOrder,
        visit: &mut dyn FnMut(Oid),
    ) -> HandlerResult<()> {
        PayloadReader::new(order, record.payload())
            .get_oid_list()?
            .into_iter()
            .filter(|oid| !oid.is_null())
            .for_each(visit);
        Ok(())
    }
}
