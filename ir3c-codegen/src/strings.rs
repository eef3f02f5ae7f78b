//! The process-wide deduplicated string pool (spec.md §6.2), ported from
//! `cgstate.CodegenState.add_string`.

use std::collections::HashMap;

#[derive(Default)]
pub struct StringPool {
    order: Vec<Vec<u8>>,
    ids: HashMap<Vec<u8>, usize>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `bytes`, returning the `.stringN` label (without the
    /// leading `.`, callers prepend it for `=.stringN` operands).
    pub fn intern(&mut self, bytes: &[u8]) -> String {
        if let Some(&id) = self.ids.get(bytes) {
            return format!("string{id}");
        }
        let id = self.order.len();
        self.ids.insert(bytes.to_vec(), id);
        self.order.push(bytes.to_vec());
        format!("string{id}")
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, &[u8])> {
        self.order.iter().enumerate().map(|(i, b)| (i, b.as_slice()))
    }
}
