//! Rendering types as source text and as mangled name components.

use uya_ir::StringInterner;

use crate::{Idx, Pool, TypeData};

impl Pool {
    /// Source-style rendering for diagnostics: `&i32`, `[u8: 4]`, `!Box_i32`.
    pub fn display(&self, idx: Idx, interner: &StringInterner) -> String {
        let mut out = String::new();
        self.write_display(idx, interner, &mut out);
        out
    }

    fn write_display(&self, idx: Idx, interner: &StringInterner, out: &mut String) {
        if let Some(name) = idx.name() {
            out.push_str(name);
            return;
        }
        match *self.data(idx) {
            TypeData::Pointer { pointee, mutable } => {
                out.push_str(if mutable { "&mut " } else { "&" });
                self.write_display(pointee, interner, out);
            }
            TypeData::Array { elem, len } => {
                out.push('[');
                self.write_display(elem, interner, out);
                out.push_str(": ");
                out.push_str(&len.to_string());
                out.push(']');
            }
            TypeData::Slice { elem, mutable } => {
                out.push_str(if mutable { "&mut [" } else { "&[" });
                self.write_display(elem, interner, out);
                out.push(']');
            }
            TypeData::Tuple { .. } => {
                out.push('(');
                for (i, &elem) in self.tuple_elems(idx).unwrap_or_default().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_display(elem, interner, out);
                }
                out.push(')');
            }
            TypeData::ErrorUnion(payload) => {
                out.push('!');
                self.write_display(payload, interner, out);
            }
            TypeData::Struct(name)
            | TypeData::Union(name)
            | TypeData::Enum(name)
            | TypeData::Interface(name)
            | TypeData::Param(name) => out.push_str(interner.lookup(name)),
            // Primitives are handled by `idx.name()` above.
            TypeData::Void | TypeData::Bool | TypeData::Int { .. } | TypeData::Float { .. } => {
                out.push_str("<primitive>");
            }
        }
    }

    /// Identifier-safe component used when synthesizing instance names:
    /// `i32`, `ptr_i32`, `mutptr_i32`, `arr3_i32`, `err_i32`, `Box_i32`.
    ///
    /// Distinct types always produce distinct components.
    pub fn mangle(&self, idx: Idx, interner: &StringInterner) -> String {
        let mut out = String::new();
        self.write_mangled(idx, interner, &mut out);
        out
    }

    fn write_mangled(&self, idx: Idx, interner: &StringInterner, out: &mut String) {
        if let Some(name) = idx.name() {
            out.push_str(name);
            return;
        }
        match *self.data(idx) {
            TypeData::Pointer { pointee, mutable } => {
                out.push_str(if mutable { "mutptr_" } else { "ptr_" });
                self.write_mangled(pointee, interner, out);
            }
            TypeData::Slice { elem, mutable } => {
                out.push_str(if mutable { "mutslice_" } else { "slice_" });
                self.write_mangled(elem, interner, out);
            }
            TypeData::Tuple { .. } => {
                let elems = self.tuple_elems(idx).unwrap_or_default();
                out.push_str("tup");
                out.push_str(&elems.len().to_string());
                for &elem in elems {
                    out.push('_');
                    self.write_mangled(elem, interner, out);
                }
            }
            TypeData::Array { elem, len } => {
                out.push_str("arr");
                out.push_str(&len.to_string());
                out.push('_');
                self.write_mangled(elem, interner, out);
            }
            TypeData::ErrorUnion(payload) => {
                out.push_str("err_");
                self.write_mangled(payload, interner, out);
            }
            TypeData::Struct(name)
            | TypeData::Union(name)
            | TypeData::Enum(name)
            | TypeData::Interface(name)
            | TypeData::Param(name) => out.push_str(interner.lookup(name)),
            TypeData::Void | TypeData::Bool | TypeData::Int { .. } | TypeData::Float { .. } => {
                out.push_str("prim");
            }
        }
    }
}
