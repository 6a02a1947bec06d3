//! Handlers for application types, described with accessor closures.
//!
//! Value fields (`bool`, numbers, text, number lists) are construction fields:
//! they are written into the instance while it is still owned, before any
//! reference is resolved. Reference fields are mutable state set through
//! `&T` once every shell of the load exists, so they need interior mutability
//! in the entity type.

use std::any::{type_name, Any, TypeId as RustTypeId};
use std::sync::{Arc, Weak};

use ogre_frame::{ByteOrder, EntityFrame, FrameResult, PayloadReader, PayloadWriter};
use ogre_registry::{erase, Lazy, LazyLink, ObjectRef};
use ogre_types::Oid;

use crate::descriptor::{FieldDescriptor, FieldKind};
use crate::error::{HandlerError, HandlerResult};
use crate::traits::{LoadContext, StoreContext, TypeHandler};

/// A value that can be a construction field.
pub trait FieldValue: Sized + Send + Sync + 'static {
    const KIND: FieldKind;

    fn write(&self, out: &mut PayloadWriter) -> FrameResult<()>;

    fn read(reader: &mut PayloadReader<'_>) -> FrameResult<Self>;
}

impl FieldValue for bool {
    const KIND: FieldKind = FieldKind::Bool;

    fn write(&self, out: &mut PayloadWriter) -> FrameResult<()> {
        out.put_bool(*self);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> FrameResult<Self> {
        reader.get_bool()
    }
}

impl FieldValue for i32 {
    const KIND: FieldKind = FieldKind::I32;

    fn write(&self, out: &mut PayloadWriter) -> FrameResult<()> {
        out.put_i32(*self);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> FrameResult<Self> {
        reader.get_i32()
    }
}

impl FieldValue for i64 {
    const KIND: FieldKind = FieldKind::I64;

    fn write(&self, out: &mut PayloadWriter) -> FrameResult<()> {
        out.put_i64(*self);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> FrameResult<Self> {
        reader.get_i64()
    }
}

impl FieldValue for f64 {
    const KIND: FieldKind = FieldKind::F64;

    fn write(&self, out: &mut PayloadWriter) -> FrameResult<()> {
        out.put_f64(*self);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> FrameResult<Self> {
        reader.get_f64()
    }
}

impl FieldValue for String {
    const KIND: FieldKind = FieldKind::Text;

    fn write(&self, out: &mut PayloadWriter) -> FrameResult<()> {
        out.put_text(self)
    }

    fn read(reader: &mut PayloadReader<'_>) -> FrameResult<Self> {
        reader.get_text().map(str::to_owned)
    }
}

impl FieldValue for Vec<i64> {
    const KIND: FieldKind = FieldKind::I64List;

    fn write(&self, out: &mut PayloadWriter) -> FrameResult<()> {
        out.put_i64_list(self)
    }

    fn read(reader: &mut PayloadReader<'_>) -> FrameResult<Self> {
        reader.get_i64_list()
    }
}

/// Per-field behaviour in each handler operation. Defaults skip the value.
trait FieldCodec<T>: Send + Sync {
    fn descriptor(&self) -> &FieldDescriptor;

    fn store(&self, instance: &T, out: &mut PayloadWriter, ctx: &mut dyn StoreContext) -> HandlerResult<()>;

    fn create(&self, _instance: &mut T, reader: &mut PayloadReader<'_>) -> HandlerResult<()> {
        Ok(self.descriptor().kind.skip(reader)?)
    }

    fn update(&self, _instance: &T, reader: &mut PayloadReader<'_>, _ctx: &dyn LoadContext) -> HandlerResult<()> {
        Ok(self.descriptor().kind.skip(reader)?)
    }

    fn visit_instance(&self, _instance: &T, _visit: &mut dyn FnMut(&ObjectRef)) {}

    fn visit_persisted(&self, reader: &mut PayloadReader<'_>, _visit: &mut dyn FnMut(Oid)) -> HandlerResult<()> {
        Ok(self.descriptor().kind.skip(reader)?)
    }
}

type Getter<T, V> = Box<dyn Fn(&T) -> V + Send + Sync>;

struct ValueField<T, V> {
    descriptor: FieldDescriptor,
    get: Getter<T, V>,
    set: Box<dyn Fn(&mut T, V) + Send + Sync>,
}

impl<T: Send + Sync, V: FieldValue> FieldCodec<T> for ValueField<T, V> {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn store(&self, instance: &T, out: &mut PayloadWriter, _ctx: &mut dyn StoreContext) -> HandlerResult<()> {
        Ok((self.get)(instance).write(out)?)
    }

    fn create(&self, instance: &mut T, reader: &mut PayloadReader<'_>) -> HandlerResult<()> {
        (self.set)(instance, V::read(reader)?);
        Ok(())
    }
}

fn resolve<U: Any + Send + Sync>(oid: Oid, ctx: &dyn LoadContext) -> HandlerResult<Arc<U>> {
    ctx.lookup_object(oid)?
        .downcast::<U>()
        .map_err(|_| HandlerError::TypeMismatch {
            oid,
            expected: type_name::<U>(),
        })
}

struct RefField<T, U> {
    descriptor: FieldDescriptor,
    get: Getter<T, Option<Arc<U>>>,
    set: Box<dyn Fn(&T, Option<Arc<U>>) + Send + Sync>,
}

impl<T: Send + Sync, U: Any + Send + Sync> FieldCodec<T> for RefField<T, U> {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn store(&self, instance: &T, out: &mut PayloadWriter, ctx: &mut dyn StoreContext) -> HandlerResult<()> {
        let oid = match (self.get)(instance) {
            Some(referent) => ctx.apply(&erase(referent))?,
            None => Oid::NULL,
        };
        out.put_oid(oid);
        Ok(())
    }

    fn update(&self, instance: &T, reader: &mut PayloadReader<'_>, ctx: &dyn LoadContext) -> HandlerResult<()> {
        let oid = reader.get_oid()?;
        let referent = if oid.is_null() {
            None
        } else {
            Some(resolve::<U>(oid, ctx)?)
        };
        (self.set)(instance, referent);
        Ok(())
    }

    fn visit_instance(&self, instance: &T, visit: &mut dyn FnMut(&ObjectRef)) {
        if let Some(referent) = (self.get)(instance) {
            visit(&erase(referent));
        }
    }

    fn visit_persisted(&self, reader: &mut PayloadReader<'_>, visit: &mut dyn FnMut(Oid)) -> HandlerResult<()> {
        let oid = reader.get_oid()?;
        if !oid.is_null() {
            visit(oid);
        }
        Ok(())
    }
}

struct RefListField<T, U> {
    descriptor: FieldDescriptor,
    get: Getter<T, Vec<Arc<U>>>,
    set: Box<dyn Fn(&T, Vec<Arc<U>>) + Send + Sync>,
}

impl<T: Send + Sync, U: Any + Send + Sync> FieldCodec<T> for RefListField<T, U> {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn store(&self, instance: &T, out: &mut PayloadWriter, ctx: &mut dyn StoreContext) -> HandlerResult<()> {
        let oids = (self.get)(instance)
            .into_iter()
            .map(|referent| ctx.apply(&erase(referent)))
            .collect::<HandlerResult<Vec<Oid>>>()?;
        Ok(out.put_oid_list(&oids)?)
    }

    fn update(&self, instance: &T, reader: &mut PayloadReader<'_>, ctx: &dyn LoadContext) -> HandlerResult<()> {
        let referents = reader
            .get_oid_list()?
            .into_iter()
            .map(|oid| resolve::<U>(oid, ctx))
            .collect::<HandlerResult<Vec<_>>>()?;
        (self.set)(instance, referents);
        Ok(())
    }

    fn visit_instance(&self, instance: &T, visit: &mut dyn FnMut(&ObjectRef)) {
        for referent in (self.get)(instance) {
            visit(&erase(referent));
        }
    }

    fn visit_persisted(&self, reader: &mut PayloadReader<'_>, visit: &mut dyn FnMut(Oid)) -> HandlerResult<()> {
        reader
            .get_oid_list()?
            .into_iter()
            .filter(|oid| !oid.is_null())
            .for_each(visit);
        Ok(())
    }
}

type LazyAccess<T, U> = Box<dyn for<'a> Fn(&'a T) -> &'a Arc<Lazy<U>> + Send + Sync>;

struct LazyField<T, U> {
    descriptor: FieldDescriptor,
    access: LazyAccess<T, U>,
}

impl<T: Send + Sync, U: Any + Send + Sync> FieldCodec<T> for LazyField<T, U> {
    fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    fn store(&self, instance: &T, out: &mut PayloadWriter, ctx: &mut dyn StoreContext) -> HandlerResult<()> {
        let lazy = (self.access)(instance);
        let oid = match lazy.peek() {
            Some(referent) => {
                let oid = ctx.apply(&erase(referent))?;
                ctx.link_lazy(Arc::clone(lazy) as Arc<dyn LazyLink>, oid);
                oid
            }
            None => lazy.object_id().unwrap_or(Oid::NULL),
        };
        out.put_oid(oid);
        Ok(())
    }

    fn update(&self, instance: &T, reader: &mut PayloadReader<'_>, ctx: &dyn LoadContext) -> HandlerResult<()> {
        let oid = reader.get_oid()?;
        let lazy = (self.access)(instance);
        if oid.is_null() {
            lazy.set(None);
            return Ok(());
        }
        match ctx.peek_object(oid) {
            Some(existing) => lazy.adopt(oid, existing, ctx.loader())?,
            None => lazy.link(oid, ctx.loader()),
        }
        let weak: Weak<Lazy<U>> = Arc::downgrade(lazy);
        ctx.track_lazy(weak);
        Ok(())
    }

    fn visit_instance(&self, instance: &T, visit: &mut dyn FnMut(&ObjectRef)) {
        if let Some(referent) = (self.access)(instance).peek() {
            visit(&erase(referent));
        }
    }
}

/// Describes an entity type field by field.
///
/// ```ignore
/// let handler = EntityHandlerBuilder::new("app.Person", Person::default)
///     .field("name", |p: &Person| p.name.clone(), |p, v| p.name = v)
///     .reference("friend", |p: &Person| p.friend(), |p, v| p.set_friend(v))
///     .lazy("history", |p: &Person| &p.history)
///     .build();
/// ```
pub struct EntityHandlerBuilder<T> {
    type_name: String,
    instantiate: Box<dyn Fn() -> T + Send + Sync>,
    codecs: Vec<Box<dyn FieldCodec<T>>>,
    on_complete: Option<Box<dyn Fn(&T) + Send + Sync>>,
}

impl<T: Any + Send + Sync> EntityHandlerBuilder<T> {
    /// `instantiate` builds the blank shell that fields are read into.
    pub fn new(type_name: impl Into<String>, instantiate: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            type_name: type_name.into(),
            instantiate: Box::new(instantiate),
            codecs: Vec::new(),
            on_complete: None,
        }
    }

    /// A construction field: bool, i32, i64, f64, `String` or `Vec<i64>`.
    pub fn field<V: FieldValue>(
        mut self,
        name: &str,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        self.codecs.push(Box::new(ValueField {
            descriptor: FieldDescriptor::new(name, V::KIND),
            get: Box::new(get),
            set: Box::new(set),
        }));
        self
    }

    /// An eager reference to another entity.
    pub fn reference<U: Any + Send + Sync>(
        mut self,
        name: &str,
        get: impl Fn(&T) -> Option<Arc<U>> + Send + Sync + 'static,
        set: impl Fn(&T, Option<Arc<U>>) + Send + Sync + 'static,
    ) -> Self {
        self.codecs.push(Box::new(RefField {
            descriptor: FieldDescriptor::new(name, FieldKind::Ref),
            get: Box::new(get),
            set: Box::new(set),
        }));
        self
    }

    /// An eager list of references.
    pub fn references<U: Any + Send + Sync>(
        mut self,
        name: &str,
        get: impl Fn(&T) -> Vec<Arc<U>> + Send + Sync + 'static,
        set: impl Fn(&T, Vec<Arc<U>>) + Send + Sync + 'static,
    ) -> Self {
        self.codecs.push(Box::new(RefListField {
            descriptor: FieldDescriptor::new(name, FieldKind::RefList),
            get: Box::new(get),
            set: Box::new(set),
        }));
        self
    }

    /// A lazy reference, loaded on first access instead of with the graph.
    pub fn lazy<U, F>(mut self, name: &str, access: F) -> Self
    where
        U: Any + Send + Sync,
        F: for<'a> Fn(&'a T) -> &'a Arc<Lazy<U>> + Send + Sync + 'static,
    {
        self.codecs.push(Box::new(LazyField {
            descriptor: FieldDescriptor::new(name, FieldKind::Lazy),
            access: Box::new(access),
        }));
        self
    }

    /// Runs once every instance of the load has been updated.
    pub fn on_complete(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> EntityHandler<T> {
        let fields = self.codecs.iter().map(|c| c.descriptor().clone()).collect();
        EntityHandler {
            type_name: self.type_name,
            fields,
            instantiate: self.instantiate,
            codecs: self.codecs,
            on_complete: self.on_complete,
        }
    }
}

/// Handler produced by [`EntityHandlerBuilder`].
pub struct EntityHandler<T> {
    type_name: String,
    fields: Vec<FieldDescriptor>,
    instantiate: Box<dyn Fn() -> T + Send + Sync>,
    codecs: Vec<Box<dyn FieldCodec<T>>>,
    on_complete: Option<Box<dyn Fn(&T) + Send + Sync>>,
}

impl<T: Any + Send + Sync> EntityHandler<T> {
    fn instance<'a>(&self, instance: &'a ObjectRef, oid: Oid) -> HandlerResult<&'a T> {
        instance
            .downcast_ref::<T>()
            .ok_or(HandlerError::TypeMismatch {
                oid,
                expected: type_name::<T>(),
            })
    }
}

impl<T: Any + Send + Sync> TypeHandler for EntityHandler<T> {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn rust_type(&self) -> RustTypeId {
        RustTypeId::of::<T>()
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
        let instance = self.instance(instance, oid)?;
        for codec in &self.codecs {
            codec.store(instance, out, ctx)?;
        }
        Ok(())
    }

    fn create(&self, record: &EntityFrame<'_>, ctx: &dyn LoadContext) -> HandlerResult<ObjectRef> {
        let mut reader = ctx.reader(record);
        let mut instance = (self.instantiate)();
        for codec in &self.codecs {
            codec.create(&mut instance, &mut reader)?;
        }
        Ok(erase(Arc::new(instance)))
    }

    fn update(
        &self,
        record: &EntityFrame<'_>,
        instance: &ObjectRef,
        ctx: &dyn LoadContext,
    ) -> HandlerResult<()> {
        let instance = self.instance(instance, record.oid())?;
        let mut reader = ctx.reader(record);
        for codec in &self.codecs {
            codec.update(instance, &mut reader, ctx)?;
        }
        Ok(())
    }

    fn complete(
        &self,
        record: &EntityFrame<'_>,
        instance: &ObjectRef,
        _ctx: &dyn LoadContext,
    ) -> HandlerResult<()> {
        if let Some(hook) = &self.on_complete {
            hook(self.instance(instance, record.oid())?);
        }
        Ok(())
    }

    fn iterate_instance_references(
        &self,
        instance: &ObjectRef,
        visit: &mut dyn FnMut(&ObjectRef),
    ) -> HandlerResult<()> {
        let instance = self.instance(instance, Oid::NULL)?;
        for codec in &self.codecs {
            codec.visit_instance(instance, visit);
        }
        Ok(())
    }

    fn iterate_persisted_references(
        &self,
        record: &EntityFrame<'_>,
        order: ByteOrder,
        visit: &mut dyn FnMut(Oid),
    ) -> HandlerResult<()> {
        let mut reader = PayloadReader::new(order, record.payload());
        for codec in &self.codecs {
            codec.visit_persisted(&mut reader, visit)?;
        }
        Ok(())
    }
}
