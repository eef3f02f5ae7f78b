//! ARM32 operands and instructions (spec.md §4.8), ported from the
//! reference compiler's `cgarm` module: a handful of constructor functions
//! instead of one enum variant per mnemonic, so peephole rules (§4.11) can
//! pattern-match on the mnemonic string and operand list uniformly.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Register(String),
    Constant(i32),
    /// `=#n` / `=.label` — a constant or label meant to be loaded from the
    /// literal pool rather than encoded as an immediate.
    ConstantMemory(String),
    /// `[base, #offset]`, optionally with writeback (`!`) for the
    /// `stmfd sp!, {...}` push/pop idiom.
    Memory { base: String, offset: i32, writeback: bool },
    /// A raw register list operand for `stmfd`/`ldmfd`.
    RegisterList(Vec<String>),
    Label(String),
    Raw(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(r) => write!(f, "{r}"),
            Operand::Constant(n) => write!(f, "#{n}"),
            Operand::ConstantMemory(s) => write!(f, "={s}"),
            Operand::Memory { base, offset, writeback } => {
                write!(f, "[{base}, #{offset}]{}", if *writeback { "!" } else { "" })
            }
            Operand::RegisterList(regs) => write!(f, "{{{}}}", regs.join(", ")),
            Operand::Label(l) => write!(f, "{l}"),
            Operand::Raw(s) => write!(f, "{s}"),
        }
    }
}

impl Operand {
    pub fn reg(name: impl Into<String>) -> Self {
        Operand::Register(name.into())
    }

    pub fn mem(base: impl Into<String>, offset: i32) -> Self {
        Operand::Memory {
            base: base.into(),
            offset,
            writeback: false,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Operand::Constant(_))
    }
}

/// One ARM32 instruction or pseudo-label. A bare `Label` has `is_label`
/// true and no mnemonic/operands; the serializer prints it unindented.
#[derive(Clone, Debug)]
pub struct Instr {
    pub mnemonic: String,
    pub operands: Vec<Operand>,
    /// Trailing raw text after the operand list (a PLT-suffixed callee
    /// name, or a free-form comment) that doesn't fit the operand model.
    pub suffix: String,
    pub annotations: Vec<String>,
    pub is_label: bool,
}

impl Instr {
    pub fn new(mnemonic: impl Into<String>, operands: Vec<Operand>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            operands,
            suffix: String::new(),
            annotations: Vec::new(),
            is_label: false,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self {
            mnemonic: String::new(),
            operands: Vec::new(),
            suffix: format!("{}:", name.into()),
            annotations: Vec::new(),
            is_label: true,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn annotate(mut self, msg: impl Into<String>) -> Self {
        self.annotations.push(msg.into());
        self
    }

    pub fn has_annotation(&self, msg: &str) -> bool {
        self.annotations.iter().any(|a| a == msg)
    }

    /// For a bare label (`is_label == true`), the label text without the
    /// trailing colon.
    pub fn label_name(&self) -> Option<&str> {
        self.is_label.then(|| self.suffix.strip_suffix(':').unwrap_or(&self.suffix))
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_label {
            return write!(f, "{}", self.suffix);
        }
        let mut body = self.mnemonic.clone();
        if !self.operands.is_empty() {
            body.push(' ');
            body.push_str(&self.operands.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "));
        }
        if !self.suffix.is_empty() {
            if !self.operands.is_empty() {
                body.push_str(", ");
            } else {
                body.push(' ');
            }
            body.push_str(&self.suffix);
        }
        if self.annotations.is_empty() {
            write!(f, "\t{body}")
        } else {
            let pad = " ".repeat(40usize.saturating_sub(body.len()));
            write!(f, "\t{body}{pad}@ {}", self.annotations.join("; "))
        }
    }
}

pub fn mov(dest: Operand, src: Operand) -> Instr {
    Instr::new("mov", vec![dest, src])
}

pub fn mov_cc(cc: &str, dest: Operand, src: Operand) -> Instr {
    Instr::new(format!("mov{cc}"), vec![dest, src])
}

pub fn add(dest: Operand, a: Operand, b: Operand) -> Instr {
    Instr::new("add", vec![dest, a, b])
}

pub fn sub(dest: Operand, a: Operand, b: Operand) -> Instr {
    Instr::new("sub", vec![dest, a, b])
}

pub fn rsb(dest: Operand, a: Operand, b: Operand) -> Instr {
    Instr::new("rsb", vec![dest, a, b])
}

pub fn mul(dest: Operand, a: Operand, b: Operand) -> Instr {
    Instr::new("mul", vec![dest, a, b])
}

pub fn cmp(a: Operand, b: Operand) -> Instr {
    Instr::new("cmp", vec![a, b])
}

pub fn branch(label: impl Into<String>) -> Instr {
    Instr::new("b", vec![Operand::Label(label.into())])
}

pub fn branch_cond(cc: &str, label: impl Into<String>) -> Instr {
    Instr::new(format!("b{cc}"), vec![Operand::Label(label.into())])
}

pub fn bl(callee: impl Into<String>) -> Instr {
    Instr::new("bl", vec![Operand::Label(callee.into())])
}

pub fn load(dest: Operand, src: Operand) -> Instr {
    Instr::new("ldr", vec![dest, src])
}

pub fn load_byte(dest: Operand, src: Operand) -> Instr {
    Instr::new("ldrb", vec![dest, src])
}

pub fn store(src: Operand, dest: Operand) -> Instr {
    Instr::new("str", vec![src, dest])
}

pub fn store_byte(src: Operand, dest: Operand) -> Instr {
    Instr::new("strb", vec![src, dest])
}

pub fn store_multiple(base: impl Into<String>, writeback: bool, regs: Vec<String>) -> Instr {
    let base = base.into();
    Instr::new("stmfd", vec![Operand::Register(format!("{base}{}", if writeback { "!" } else { "" })), Operand::RegisterList(regs)])
}

pub fn load_multiple(base: impl Into<String>, writeback: bool, regs: Vec<String>) -> Instr {
    let base = base.into();
    Instr::new("ldmfd", vec![Operand::Register(format!("{base}{}", if writeback { "!" } else { "" })), Operand::RegisterList(regs)])
}
