use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Segment::Constant => "constant",
            Segment::Argument => "argument",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        };
        f.write_str(name)
    }
}

/// Operations the target machine executes natively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Gt,
    Lt,
    And,
    Or,
    Not,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mnemonic = match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Neg => "neg",
            ArithmeticOp::Eq => "eq",
            ArithmeticOp::Gt => "gt",
            ArithmeticOp::Lt => "lt",
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Not => "not",
        };
        f.write_str(mnemonic)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Push(Segment, u16),
    Pop(Segment, u16),
    Arithmetic(ArithmeticOp),
    Label(String),
    Goto(String),
    IfGoto(String),
    Function { name: String, n_locals: u16 },
    Call { name: String, n_args: u16 },
    Return,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Push(segment, index) => write!(f, "push {} {}", segment, index),
            Instruction::Pop(segment, index) => write!(f, "pop {} {}", segment, index),
            Instruction::Arithmetic(op) => write!(f, "{}", op),
            Instruction::Label(label) => write!(f, "label {}", label),
            Instruction::Goto(label) => write!(f, "goto {}", label),
            Instruction::IfGoto(label) => write!(f, "if-goto {}", label),
            Instruction::Function { name, n_locals } => write!(f, "function {} {}", name, n_locals),
            Instruction::Call { name, n_args } => write!(f, "call {} {}", name, n_args),
            Instruction::Return => f.write_str("return"),
        }
    }
}

/// Instructions of one compiled class, in emission order.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Chunk {
    code: Vec<Instruction>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    #[cfg(feature = "debug-logging")]
    pub fn disassemble(&self, name: &str) {
        tracing::trace!("== {} ==", name);
        for (offset, instruction) in self.code.iter().enumerate() {
            tracing::trace!("{:>4} {}", offset, instruction);
        }
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instruction in self.code() {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_one_instruction_per_line() {
        let mut chunk = Chunk::new();
        chunk.append(Instruction::Function {
            name: "Main.main".to_string(),
            n_locals: 2,
        });
        chunk.append(Instruction::Push(Segment::Constant, 3));
        chunk.append(Instruction::Pop(Segment::Local, 0));
        chunk.append(Instruction::Label("WHILE_START0".to_string()));
        chunk.append(Instruction::IfGoto("WHILE_END0".to_string()));
        chunk.append(Instruction::Goto("WHILE_START0".to_string()));
        chunk.append(Instruction::Arithmetic(ArithmeticOp::Not));
        chunk.append(Instruction::Call {
            name: "Math.multiply".to_string(),
            n_args: 2,
        });
        chunk.append(Instruction::Return);

        assert_eq!(
            chunk.to_string(),
            "function Main.main 2\n\
             push constant 3\n\
             pop local 0\n\
             label WHILE_START0\n\
             if-goto WHILE_END0\n\
             goto WHILE_START0\n\
             not\n\
             call Math.multiply 2\n\
             return\n"
        );
        assert_eq!(chunk.len(), 9);
    }

    #[test]
    fn empty_chunk_renders_nothing() {
        let chunk = Chunk::new();
        assert_eq!(chunk.len(), 0);
        assert_eq!(chunk.to_string(), "");
    }
}
