//! Class field layout (spec.md §4.7), ported from `cgstate.CGClass`.

use ir3c_ir::{ClassDefn, Type};
use std::collections::HashMap;

pub const POINTER_SIZE: i32 = 4;

pub struct ClassLayout {
    offsets: HashMap<String, i32>,
    sizes: HashMap<String, i32>,
    total_size: i32,
}

impl ClassLayout {
    /// Non-boolean fields first (4 bytes each), then booleans (1 byte
    /// each); total size rounded up to 4 bytes, minimum 4.
    pub fn build(class: &ClassDefn) -> Self {
        let mut offsets = HashMap::new();
        let mut sizes = HashMap::new();
        let mut offset = 0;

        for field in class.fields.iter().filter(|f| f.ty != Type::Bool) {
            offsets.insert(field.name.clone(), offset);
            sizes.insert(field.name.clone(), POINTER_SIZE);
            offset += POINTER_SIZE;
        }
        for field in class.fields.iter().filter(|f| f.ty == Type::Bool) {
            offsets.insert(field.name.clone(), offset);
            sizes.insert(field.name.clone(), 1);
            offset += 1;
        }

        let total_size = (POINTER_SIZE * ((offset + POINTER_SIZE - 1) / POINTER_SIZE)).max(POINTER_SIZE);

        Self {
            offsets,
            sizes,
            total_size,
        }
    }

    pub fn field_offset(&self, field: &str) -> i32 {
        self.offsets[field]
    }

    pub fn field_size(&self, field: &str) -> i32 {
        self.sizes[field]
    }

    pub fn size(&self) -> i32 {
        self.total_size
    }
}

pub struct ProgramLayout {
    classes: HashMap<String, ClassLayout>,
}

impl ProgramLayout {
    pub fn build(classes: &[ClassDefn]) -> Self {
        Self {
            classes: classes.iter().map(|c| (c.name.clone(), ClassLayout::build(c))).collect(),
        }
    }

    pub fn class(&self, name: &str) -> &ClassLayout {
        &self.classes[name]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ir3c_diagnostics::Span;
    use ir3c_ir::VarDecl;

    fn synth() -> Span {
        Span::synthetic()
    }

    #[test]
    fn booleans_are_packed_after_pointer_sized_fields() {
        let class = ClassDefn::new(
            "Foo",
            vec![
                VarDecl::new("flag", Type::Bool),
                VarDecl::new("count", Type::Int),
                VarDecl::new("other_flag", Type::Bool),
            ],
            synth(),
        );
        let layout = ClassLayout::build(&class);
        assert_eq!(layout.field_offset("count"), 0);
        assert_eq!(layout.field_offset("flag"), 4);
        assert_eq!(layout.field_offset("other_flag"), 5);
        assert_eq!(layout.size(), 8);
    }

    #[test]
    fn an_empty_class_still_occupies_one_word() {
        let class = ClassDefn::new("Empty", vec![], synth());
        assert_eq!(ClassLayout::build(&class).size(), 4);
    }
}
