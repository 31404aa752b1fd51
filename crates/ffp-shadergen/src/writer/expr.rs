use std::fmt::Write;

use super::WriterError;
use crate::ir::{
    ElementType, Function, FunctionInvocation, Operand, OperandValue, Parameter, ParameterId,
    ParameterScope, Program,
};
use crate::library::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Dialect {
    Wgsl,
    Glsl,
}

impl Dialect {
    pub(super) fn vector_type(self, components: u32) -> String {
        match (self, components) {
            (Dialect::Wgsl, 1) => "f32".to_string(),
            (Dialect::Wgsl, n) => format!("vec{n}<f32>"),
            (Dialect::Glsl, 1) => "float".to_string(),
            (Dialect::Glsl, n) => format!("vec{n}"),
        }
    }
}

/// Literal that parses as a float in both dialects (`1.0`, `0.5`, `1e-7`).
pub(super) fn float_literal(v: f32) -> String {
    if !v.is_finite() {
        return "0.0".to_string();
    }
    format!("{v:?}")
}

/// Resolves operands of atoms belonging to one function.
pub(super) struct FunctionScope<'a> {
    pub(super) program: &'a Program,
    pub(super) function: &'a Function,
    pub(super) dialect: Dialect,
    /// WGSL helper functions receive their outputs as `ptr<function, T>`.
    pub(super) deref_outputs: bool,
}

impl FunctionScope<'_> {
    fn parameter(&self, id: ParameterId) -> Result<&Parameter, WriterError> {
        let found = match id.scope() {
            ParameterScope::Global => self.program.parameter(id),
            _ => self.function.parameter(id),
        };
        found.ok_or(WriterError::UnknownParameter(id))
    }

    fn parameter_name(&self, id: ParameterId) -> Result<String, WriterError> {
        let name = self.parameter(id)?.name();
        if self.deref_outputs && matches!(id.scope(), ParameterScope::Output(_)) {
            Ok(format!("(*{name})"))
        } else {
            Ok(name.to_string())
        }
    }

    fn operand_width(&self, operand: &Operand) -> Result<u32, WriterError> {
        match operand.value() {
            OperandValue::Literal(_) => Ok(1),
            OperandValue::Parameter(id) => {
                if operand.mask().is_whole() {
                    Ok(self.parameter(id)?.element_type().component_count())
                } else {
                    Ok(operand.mask().component_count())
                }
            }
        }
    }

    fn operand_expr(&self, operand: &Operand) -> Result<String, WriterError> {
        let id = match operand.value() {
            OperandValue::Literal(v) => return Ok(float_literal(v)),
            OperandValue::Parameter(id) => id,
        };
        let ty: ElementType = self.parameter(id)?.element_type();
        let name = self.parameter_name(id)?;
        if ty.is_sampler() {
            return Ok(match self.dialect {
                // Textures and samplers are separate bindings in WGSL.
                Dialect::Wgsl => format!("{name}, {name}_sampler"),
                Dialect::Glsl => name,
            });
        }
        if operand.mask().is_whole() {
            Ok(name)
        } else {
            Ok(format!("{name}.{}", operand.mask().swizzle()))
        }
    }

    /// Renders `target = expr;` for one invocation.
    pub(super) fn invocation_statement(
        &self,
        invocation: &FunctionInvocation,
    ) -> Result<String, WriterError> {
        let function = invocation.function_name();
        let mut target = None;
        let mut args = Vec::new();
        for operand in invocation.operands() {
            if operand.is_target() && target.replace(operand).is_some() {
                return Err(WriterError::MultipleTargets {
                    function: function.to_string(),
                });
            }
            if operand.is_argument() {
                args.push(operand);
            }
        }
        let target = target.ok_or_else(|| WriterError::MissingTarget {
            function: function.to_string(),
        })?;
        let target_id = target.parameter().ok_or_else(|| WriterError::LiteralTarget {
            function: function.to_string(),
        })?;

        let arg_exprs = args
            .iter()
            .map(|op| self.operand_expr(op))
            .collect::<Result<Vec<_>, _>>()?;
        let widths = args
            .iter()
            .map(|op| self.operand_width(op))
            .collect::<Result<Vec<_>, _>>()?;
        let target_width = self.operand_width(target)?;

        let expr = match self.generic_operation(function, &arg_exprs, &widths, target_width) {
            Some(expr) => expr?,
            None => format!("{function}({})", arg_exprs.join(", ")),
        };

        let base = self.parameter_name(target_id)?;
        let mask = target.mask();
        if mask.is_whole() {
            return Ok(format!("{base} = {expr};"));
        }
        let swizzle = mask.swizzle();
        if self.dialect == Dialect::Glsl || swizzle.len() == 1 {
            return Ok(format!("{base}.{swizzle} = {expr};"));
        }

        // WGSL cannot assign through a multi-component swizzle.
        let mut statement = format!("{{ let masked = {expr};");
        for (src, dst) in "xyzw".chars().zip(swizzle.chars()) {
            let _ = write!(statement, " {base}.{dst} = masked.{src};");
        }
        statement.push_str(" }");
        Ok(statement)
    }

    fn generic_operation(
        &self,
        function: &str,
        args: &[String],
        widths: &[u32],
        target_width: u32,
    ) -> Option<Result<String, WriterError>> {
        let arity = |expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(WriterError::ArgumentCount {
                    function: function.to_string(),
                    expected,
                    found: args.len(),
                })
            }
        };

        let expr = match function {
            FFP_FUNC_ASSIGN => arity(1).map(|()| args[0].clone()),
            FFP_FUNC_CONSTRUCT => match args.len() {
                1 => Ok(args[0].clone()),
                n @ 2..=4 => Ok(format!(
                    "{}({})",
                    self.dialect.vector_type(n as u32),
                    args.join(", ")
                )),
                found => Err(WriterError::ArgumentCount {
                    function: function.to_string(),
                    expected: 4,
                    found,
                }),
            },
            FFP_FUNC_MODULATE => arity(2).map(|()| format!("({} * {})", args[0], args[1])),
            FFP_FUNC_MODULATE_X2 => {
                arity(2).map(|()| format!("({} * {} * 2.0)", args[0], args[1]))
            }
            FFP_FUNC_MODULATE_X4 => {
                arity(2).map(|()| format!("({} * {} * 4.0)", args[0], args[1]))
            }
            FFP_FUNC_ADD => arity(2).map(|()| format!("({} + {})", args[0], args[1])),
            FFP_FUNC_ADD_SIGNED => {
                arity(2).map(|()| format!("({} + {} - 0.5)", args[0], args[1]))
            }
            FFP_FUNC_ADD_SMOOTH => arity(2).map(|()| {
                format!("({0} + {1} - {0} * {1})", args[0], args[1])
            }),
            FFP_FUNC_SUBTRACT => arity(2).map(|()| format!("({} - {})", args[0], args[1])),
            FFP_FUNC_LERP => {
                arity(3).map(|()| format!("mix({}, {}, {})", args[0], args[1], args[2]))
            }
            FFP_FUNC_TRANSFORM => arity(2).map(|()| format!("({} * {})", args[0], args[1])),
            FFP_FUNC_DOT_PRODUCT => {
                arity(2).map(|()| self.dot_product(args, widths, target_width))
            }
            _ => return None,
        };
        Some(expr)
    }

    /// Legacy DOT3: `4 * dot(a.rgb - 0.5, b.rgb - 0.5)` replicated to every written component.
    /// Scalar operands (alpha-only blending) degrade to a product.
    fn dot_product(&self, args: &[String], widths: &[u32], target_width: u32) -> String {
        if widths[0].min(widths[1]) < 3 {
            return format!("({} * {})", args[0], args[1]);
        }
        let rgb = |arg: &str, width: u32| {
            if width > 3 {
                format!("({arg}).xyz")
            } else {
                arg.to_string()
            }
        };
        let dot = format!(
            "(dot({} - 0.5, {} - 0.5) * 4.0)",
            rgb(&args[0], widths[0]),
            rgb(&args[1], widths[1])
        );
        if target_width <= 1 {
            dot
        } else {
            format!("{}({dot})", self.dialect.vector_type(target_width))
        }
    }
}
