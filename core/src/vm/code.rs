use core::fmt;

use crate::{object::Object, vm::Instructions};

/// Output of one compilation: top-level instructions plus the constant pool
/// they index into.
#[derive(Clone, Default, PartialEq)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

impl Bytecode {
    pub fn new(instructions: Instructions, constants: Vec<Object>) -> Self {
        Self {
            instructions,
            constants,
        }
    }
}

impl fmt::Debug for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Bytecode {{")?;

        if self.constants.is_empty() {
            writeln!(f, "  constants: []")?;
        } else {
            writeln!(f, "  constants: [")?;
            for (i, constant) in self.constants.iter().enumerate() {
                match constant {
                    // Function bodies are disassembled inline.
                    Object::CompiledFunction(function) => {
                        writeln!(
                            f,
                            "    [{}] = fn(locals: {}, params: {})",
                            i, function.num_locals, function.num_parameters
                        )?;
                        for line in function.instructions.to_string().lines() {
                            writeln!(f, "          {}", line)?;
                        }
                    }
                    other => writeln!(f, "    [{}] = {:?}", i, other)?,
                }
            }
            writeln!(f, "  ]")?;
        }

        writeln!(f, "  instructions:")?;
        for line in self.instructions.to_string().lines() {
            writeln!(f, "    {}", line)?;
        }

        write!(f, "}}")
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instructions)
    }
}
