use crate::chunk::{ArithmeticOp, Chunk, Instruction, Segment};

/// Binary operators of the source language. Multiplication and division
/// have no machine instruction and go through the runtime `Math` class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Less,
    Greater,
    Equal,
}

/// Appends target instructions to an in-memory chunk. The chunk only
/// leaves the generator through `end`, once the class compiled.
pub struct Generator {
    chunk: Chunk,
}

impl Generator {
    pub fn new() -> Self {
        Self {
            chunk: Chunk::new(),
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        self.chunk.append(instruction)
    }

    pub fn emit_arithmetic(&mut self, op: ArithmeticOp) {
        self.emit(Instruction::Arithmetic(op))
    }

    pub fn emit_operator(&mut self, operator: Operator) {
        match operator {
            Operator::Add => self.emit_arithmetic(ArithmeticOp::Add),
            Operator::Sub => self.emit_arithmetic(ArithmeticOp::Sub),
            Operator::And => self.emit_arithmetic(ArithmeticOp::And),
            Operator::Or => self.emit_arithmetic(ArithmeticOp::Or),
            Operator::Less => self.emit_arithmetic(ArithmeticOp::Lt),
            Operator::Greater => self.emit_arithmetic(ArithmeticOp::Gt),
            Operator::Equal => self.emit_arithmetic(ArithmeticOp::Eq),
            Operator::Mul => self.emit_call("Math.multiply", 2),
            Operator::Div => self.emit_call("Math.divide", 2),
        }
    }

    pub fn emit_push(&mut self, segment: Segment, index: u16) {
        self.emit(Instruction::Push(segment, index))
    }

    pub fn emit_pop(&mut self, segment: Segment, index: u16) {
        self.emit(Instruction::Pop(segment, index))
    }

    pub fn emit_label(&mut self, label: &str) {
        self.emit(Instruction::Label(label.to_string()))
    }

    pub fn emit_goto(&mut self, label: &str) {
        self.emit(Instruction::Goto(label.to_string()))
    }

    /// Jumps when the popped value is non-zero; callers negate conditions
    /// that should skip a block.
    pub fn emit_if_goto(&mut self, label: &str) {
        self.emit(Instruction::IfGoto(label.to_string()))
    }

    pub fn emit_function(&mut self, class_name: &str, name: &str, n_locals: u16) {
        self.emit(Instruction::Function {
            name: format!("{}.{}", class_name, name),
            n_locals,
        })
    }

    pub fn emit_call(&mut self, name: &str, n_args: u16) {
        self.emit(Instruction::Call {
            name: name.to_string(),
            n_args,
        })
    }

    pub fn emit_return(&mut self) {
        self.emit(Instruction::Return)
    }

    pub fn end(self) -> Chunk {
        self.chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn operators_lower_to_arithmetic_or_math_calls() {
        let mut generator = Generator::new();
        for operator in [
            Operator::Add,
            Operator::Sub,
            Operator::Mul,
            Operator::Div,
            Operator::And,
            Operator::Or,
            Operator::Less,
            Operator::Greater,
            Operator::Equal,
        ]
        .iter()
        {
            generator.emit_operator(*operator);
        }
        assert_eq!(
            generator.end().to_string(),
            "add\nsub\ncall Math.multiply 2\ncall Math.divide 2\nand\nor\nlt\ngt\neq\n"
        );
    }

    #[test]
    fn function_prologue_and_control_flow() {
        let mut generator = Generator::new();
        generator.emit_function("C", "m", 2);
        generator.emit_push(Segment::Argument, 0);
        generator.emit_pop(Segment::Pointer, 0);
        generator.emit_label("L");
        generator.emit_arithmetic(ArithmeticOp::Neg);
        generator.emit_if_goto("L");
        generator.emit_goto("L");
        generator.emit_return();
        assert_eq!(
            generator.end().to_string(),
            "function C.m 2\npush argument 0\npop pointer 0\nlabel L\nneg\nif-goto L\ngoto L\nreturn\n"
        );
    }
}
