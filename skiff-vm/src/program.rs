// skiff-vm - Bytecode compiler and virtual machine for the Skiff programming language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime program: global slot map, type/union descriptors, and the
//! builder that assembles them.
//!
//! The VM consumes a [`RuntimeProgram`] snapshot read-only at construction
//! time: resolved globals are written into the slot array once, and
//! thereafter everything goes through slot indices.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use skiff_parser::ast::Expr;

use crate::builtins;
use crate::function::{ForeignFunction, UserFunction};
use crate::value::{RefValue, UnionValue, Value};
use crate::vm::stack::GLOBAL_SLOTS;

/// A user-defined type: field names plus a method table. The method table
/// is filled in during compilation and read-only afterwards.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: Vec<String>,
    pub methods: RefCell<IndexMap<String, Rc<UserFunction>>>,
}

impl TypeDescriptor {
    /// Create a descriptor with an empty method table.
    pub fn new(name: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            name: name.into(),
            fields,
            methods: RefCell::new(IndexMap::new()),
        }
    }

    /// Look up a method by name.
    pub fn method(&self, name: &str) -> Option<Rc<UserFunction>> {
        self.methods.borrow().get(name).cloned()
    }
}

/// One variant of a union: a name and its positional field names.
#[derive(Debug, Clone)]
pub struct VariantDescriptor {
    pub name: String,
    pub fields: Vec<String>,
}

/// A union type: a closed set of variants.
#[derive(Debug)]
pub struct UnionDescriptor {
    pub name: String,
    pub variants: Vec<VariantDescriptor>,
}

impl UnionDescriptor {
    /// Index of the variant with the given name.
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.name == name)
    }
}

/// The compiled program artifact the VM consumes at start-up.
#[derive(Debug, Clone)]
pub struct RuntimeProgram {
    /// Global name → slot index.
    pub global_slots: IndexMap<String, usize>,
    /// Resolved global values, seeded into slots at VM construction.
    pub global_values: IndexMap<String, Value>,
    pub types: IndexMap<String, Rc<TypeDescriptor>>,
    pub unions: IndexMap<String, Rc<UnionDescriptor>>,
}

impl RuntimeProgram {
    /// The slot allocated to a global name.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.global_slots.get(name).copied()
    }
}

/// Error raised when the program exceeds its global capacity or redeclares
/// a builtin.
#[derive(Debug, Clone)]
pub struct ProgramError(pub String);

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Program error: {}", self.0)
    }
}

impl std::error::Error for ProgramError {}

/// Accumulates global declarations across compilations (the REPL reuses one
/// builder so slot indices stay stable) and produces [`RuntimeProgram`]
/// snapshots.
#[derive(Debug)]
pub struct ProgramBuilder {
    slots: IndexMap<String, usize>,
    slot_count: usize,
    values: IndexMap<String, Value>,
    types: IndexMap<String, Rc<TypeDescriptor>>,
    unions: IndexMap<String, Rc<UnionDescriptor>>,
    /// The anonymous dynamic-object type shared by object literals.
    dynamic_type: Rc<TypeDescriptor>,
    /// Field-default expressions per type, applied at instantiation sites.
    type_defaults: IndexMap<String, Vec<(String, Expr)>>,
    /// Declared traits: name → method names. Declaration-only.
    traits: IndexMap<String, Vec<String>>,
}

impl ProgramBuilder {
    /// Create a builder with slot 0 reserved for the argv array, the
    /// builtin functions registered, and the Option/Result unions defined.
    pub fn new() -> Self {
        let mut builder = Self {
            slots: IndexMap::new(),
            slot_count: 0,
            values: IndexMap::new(),
            types: IndexMap::new(),
            unions: IndexMap::new(),
            dynamic_type: Rc::new(TypeDescriptor::new("Object", Vec::new())),
            type_defaults: IndexMap::new(),
            traits: IndexMap::new(),
        };

        // Slot 0 always holds the program arguments.
        builder.slot("args");
        builder.values.insert("args".into(), Value::list(Vec::new()));

        builtins::register(&mut builder);

        builder.define_union(
            "Option",
            vec![
                VariantDescriptor {
                    name: "Some".into(),
                    fields: vec!["value".into()],
                },
                VariantDescriptor {
                    name: "None".into(),
                    fields: Vec::new(),
                },
            ],
        );
        builder.define_union(
            "Result",
            vec![
                VariantDescriptor {
                    name: "Ok".into(),
                    fields: vec!["value".into()],
                },
                VariantDescriptor {
                    name: "Err".into(),
                    fields: vec!["error".into()],
                },
            ],
        );

        builder
    }

    /// The shared descriptor for anonymous object literals.
    pub fn dynamic_type(&self) -> Rc<TypeDescriptor> {
        Rc::clone(&self.dynamic_type)
    }

    /// Allocate (or return the existing) slot for a global name.
    pub fn slot(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.slots.get(name) {
            return slot;
        }
        let slot = self.slot_count;
        self.slots.insert(name.to_string(), slot);
        self.slot_count += 1;
        slot
    }

    /// Allocate a hidden, unnamed global slot (loop counters at script
    /// scope).
    pub fn anonymous_slot(&mut self) -> usize {
        let slot = self.slot_count;
        self.slot_count += 1;
        slot
    }

    /// The slot of an already-declared global.
    pub fn lookup_slot(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    /// The resolved value of a global, when one exists.
    pub fn global_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Register a foreign function under a global name.
    pub fn define_foreign(
        &mut self,
        name: &str,
        callable: impl Fn(&[Value]) -> Result<Value, String> + 'static,
    ) {
        self.slot(name);
        self.values.insert(
            name.to_string(),
            Value::from_ref(RefValue::Foreign(ForeignFunction::new(name, callable))),
        );
    }

    /// Register a compiled user function under its global name.
    pub fn define_function(&mut self, name: &str, function: Rc<UserFunction>) {
        self.slot(name);
        self.values
            .insert(name.to_string(), Value::from_ref(RefValue::Function(function)));
    }

    /// Register a user type: a global slot holding the descriptor.
    pub fn define_type(&mut self, name: &str, fields: Vec<String>) -> Rc<TypeDescriptor> {
        let descriptor = Rc::new(TypeDescriptor::new(name, fields));
        self.slot(name);
        self.values.insert(
            name.to_string(),
            Value::from_ref(RefValue::Type(Rc::clone(&descriptor))),
        );
        self.types.insert(name.to_string(), Rc::clone(&descriptor));
        descriptor
    }

    /// Look up a type descriptor by name.
    pub fn lookup_type(&self, name: &str) -> Option<Rc<TypeDescriptor>> {
        self.types.get(name).cloned()
    }

    /// Register a union: a slot for the union name plus one per variant.
    /// Nullary variants resolve to their singleton instance; variants with
    /// fields resolve to callable constructors.
    pub fn define_union(&mut self, name: &str, variants: Vec<VariantDescriptor>) {
        let descriptor = Rc::new(UnionDescriptor {
            name: name.to_string(),
            variants,
        });

        self.slot(name);
        self.values.insert(
            name.to_string(),
            Value::from_ref(RefValue::UnionType(Rc::clone(&descriptor))),
        );

        for (index, variant) in descriptor.variants.iter().enumerate() {
            self.slot(&variant.name);
            let value = if variant.fields.is_empty() {
                Value::from_ref(RefValue::Union(UnionValue {
                    union: Rc::clone(&descriptor),
                    variant: index,
                    values: Vec::new(),
                }))
            } else {
                Value::from_ref(RefValue::VariantCtor {
                    union: Rc::clone(&descriptor),
                    variant: index,
                })
            };
            self.values.insert(variant.name.clone(), value);
        }

        self.unions.insert(name.to_string(), descriptor);
    }

    /// Record a type's field-default expressions for instantiation sites.
    pub fn set_type_defaults(&mut self, name: &str, defaults: Vec<(String, Expr)>) {
        self.type_defaults.insert(name.to_string(), defaults);
    }

    /// The recorded field defaults of a type.
    pub fn type_defaults(&self, name: &str) -> Option<&[(String, Expr)]> {
        self.type_defaults.get(name).map(|v| v.as_slice())
    }

    /// Record a trait declaration.
    pub fn declare_trait(&mut self, name: &str, methods: Vec<String>) {
        self.traits.insert(name.to_string(), methods);
    }

    /// Look up a union descriptor by name.
    pub fn lookup_union(&self, name: &str) -> Option<Rc<UnionDescriptor>> {
        self.unions.get(name).cloned()
    }

    /// Find the union and variant index a variant name belongs to.
    pub fn lookup_variant(&self, name: &str) -> Option<(Rc<UnionDescriptor>, usize)> {
        for union in self.unions.values() {
            if let Some(index) = union.variant_index(name) {
                return Some((Rc::clone(union), index));
            }
        }
        None
    }

    /// Snapshot the builder into a read-only program. Fails when the
    /// global table exceeds the fixed slot capacity.
    pub fn finish(&self) -> Result<RuntimeProgram, ProgramError> {
        if self.slot_count > GLOBAL_SLOTS {
            return Err(ProgramError(format!(
                "Too many globals: {} slots used, {} available",
                self.slot_count, GLOBAL_SLOTS
            )));
        }

        Ok(RuntimeProgram {
            global_slots: self.slots.clone(),
            global_values: self.values.clone(),
            types: self.types.clone(),
            unions: self.unions.clone(),
        })
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_occupy_slot_zero() {
        let mut builder = ProgramBuilder::new();
        assert_eq!(builder.slot("args"), 0);
    }

    #[test]
    fn slots_are_stable_across_lookups() {
        let mut builder = ProgramBuilder::new();
        let a = builder.slot("a");
        let b = builder.slot("b");
        assert_ne!(a, b);
        assert_eq!(builder.slot("a"), a);
    }

    #[test]
    fn builtin_unions_are_registered() {
        let builder = ProgramBuilder::new();
        assert!(builder.lookup_variant("Some").is_some());
        assert!(builder.lookup_variant("Err").is_some());
        assert!(builder.global_value("None").is_some());
        assert!(builder.lookup_slot("print").is_some());
    }
}
