use std::fmt::Write;

use super::expr::{Dialect, FunctionScope};
use super::{glsl_library, header, vertex_attribute_location, ProgramWriter, WriterError};
use crate::config::TargetLanguage;
use crate::ir::{ElementType, Function, FunctionAtom, Parameter, Program, Semantic, ShaderStage};

/// GLSL 3.30 writer. Varyings are linked by name (`v_texcoord0`), so both stages agree without
/// explicit locations.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlslProgramWriter;

impl ProgramWriter for GlslProgramWriter {
    fn target_language(&self) -> TargetLanguage {
        TargetLanguage::Glsl
    }

    fn file_extension(&self) -> &'static str {
        "glsl"
    }

    fn entry_point_name(&self, _stage: ShaderStage) -> &'static str {
        "main"
    }

    fn write_source(&self, program: &Program, profile: &str) -> Result<String, WriterError> {
        program.validate()?;

        let mut glsl = format!("#version {profile}\n");
        glsl.push_str(&header(program, TargetLanguage::Glsl));
        glsl.push('\n');

        for library in program.dependencies() {
            let source = glsl_library::source(library).ok_or_else(|| WriterError::UnknownLibrary {
                language: TargetLanguage::Glsl,
                library: library.clone(),
            })?;
            let _ = writeln!(glsl, "// {library}");
            glsl.push_str(source);
            glsl.push('\n');
        }

        for param in program.parameters() {
            let ty = type_name(param.element_type())?;
            let _ = writeln!(glsl, "uniform {ty} {};", param.name());
        }
        if !program.parameters().is_empty() {
            glsl.push('\n');
        }

        let entry = program.entry_point().ok_or(crate::ir::IrError::MissingEntryPoint)?;
        write_interface(&mut glsl, program.stage(), entry)?;

        for function in program.functions() {
            if !program.is_entry_point(function.id()) {
                write_helper(&mut glsl, program, function)?;
            }
        }
        write_main(&mut glsl, program, entry)?;
        Ok(glsl)
    }
}

fn type_name(ty: ElementType) -> Result<&'static str, WriterError> {
    Ok(match ty {
        ElementType::Float1 => "float",
        ElementType::Float2 => "vec2",
        ElementType::Float3 => "vec3",
        ElementType::Float4 => "vec4",
        ElementType::Matrix3x3 => "mat3",
        ElementType::Matrix4x4 => "mat4",
        ElementType::Int1 => "int",
        ElementType::Sampler1D => "sampler1D",
        ElementType::Sampler2D => "sampler2D",
        ElementType::Sampler3D => "sampler3D",
        ElementType::SamplerCube => "samplerCube",
    })
}

fn value_type(ty: ElementType) -> Result<&'static str, WriterError> {
    if ty.is_sampler() {
        return Err(WriterError::UnsupportedType {
            ty,
            usage: "a GLSL value",
        });
    }
    type_name(ty)
}

fn zero_value(ty: ElementType) -> Result<String, WriterError> {
    Ok(match ty {
        ElementType::Float1 => "0.0".to_string(),
        ElementType::Int1 => "0".to_string(),
        other => format!("{}(0.0)", value_type(other)?),
    })
}

fn varying_name(param: &Parameter) -> String {
    format!(
        "v_{}{}",
        param.semantic().name_tag().to_lowercase(),
        param.index()
    )
}

fn is_position(param: &Parameter) -> bool {
    param.semantic() == Semantic::Position
}

fn write_interface(
    glsl: &mut String,
    stage: ShaderStage,
    entry: &Function,
) -> Result<(), WriterError> {
    match stage {
        ShaderStage::Vertex => {
            for param in entry.input_parameters() {
                let _ = writeln!(
                    glsl,
                    "layout(location = {}) in {} a_{};",
                    vertex_attribute_location(param.semantic(), param.index())?,
                    value_type(param.element_type())?,
                    param.name()
                );
            }
            for param in entry.output_parameters().iter().filter(|p| !is_position(p)) {
                let _ = writeln!(
                    glsl,
                    "out {} {};",
                    value_type(param.element_type())?,
                    varying_name(param)
                );
            }
        }
        ShaderStage::Fragment => {
            for param in entry.input_parameters().iter().filter(|p| !is_position(p)) {
                let _ = writeln!(
                    glsl,
                    "in {} {};",
                    value_type(param.element_type())?,
                    varying_name(param)
                );
            }
            for param in entry.output_parameters() {
                if param.semantic() != Semantic::Color {
                    return Err(WriterError::UnsupportedSemantic {
                        semantic: param.semantic(),
                        index: param.index(),
                        usage: "a fragment output",
                    });
                }
                let _ = writeln!(
                    glsl,
                    "layout(location = {}) out {} f_{};",
                    param.index(),
                    value_type(param.element_type())?,
                    param.name()
                );
            }
        }
    }
    glsl.push('\n');
    Ok(())
}

fn write_body(
    glsl: &mut String,
    scope: &FunctionScope<'_>,
    function: &Function,
) -> Result<(), WriterError> {
    let mut atoms: Vec<&FunctionAtom> = function.atom_instances().iter().collect();
    atoms.sort_by_key(|atom| atom.sort_key());
    for atom in atoms {
        let FunctionAtom::Invocation(invocation) = atom;
        let _ = writeln!(glsl, "    {}", scope.invocation_statement(invocation)?);
    }
    Ok(())
}

fn write_zeroed(glsl: &mut String, params: &[Parameter]) -> Result<(), WriterError> {
    for param in params {
        let ty = param.element_type();
        let _ = writeln!(glsl, "    {} {} = {};", value_type(ty)?, param.name(), zero_value(ty)?);
    }
    Ok(())
}

fn write_helper(
    glsl: &mut String,
    program: &Program,
    function: &Function,
) -> Result<(), WriterError> {
    let mut formals = Vec::new();
    for param in function.input_parameters() {
        formals.push(format!("in {} {}", value_type(param.element_type())?, param.name()));
    }
    for param in function.output_parameters() {
        formals.push(format!("out {} {}", value_type(param.element_type())?, param.name()));
    }
    if !function.description().is_empty() {
        let _ = writeln!(glsl, "// {}", function.description());
    }
    let _ = writeln!(glsl, "void {}({}) {{", function.name(), formals.join(", "));
    write_zeroed(glsl, function.local_parameters())?;
    let scope = FunctionScope {
        program,
        function,
        dialect: Dialect::Glsl,
        deref_outputs: false,
    };
    write_body(glsl, &scope, function)?;
    glsl.push_str("}\n\n");
    Ok(())
}

fn write_main(
    glsl: &mut String,
    program: &Program,
    function: &Function,
) -> Result<(), WriterError> {
    let stage = program.stage();
    glsl.push_str("void main() {\n");
    for param in function.input_parameters() {
        let source = match stage {
            ShaderStage::Vertex => format!("a_{}", param.name()),
            ShaderStage::Fragment if is_position(param) => "gl_FragCoord".to_string(),
            ShaderStage::Fragment => varying_name(param),
        };
        let _ = writeln!(
            glsl,
            "    {} {} = {source};",
            value_type(param.element_type())?,
            param.name()
        );
    }
    write_zeroed(glsl, function.output_parameters())?;
    write_zeroed(glsl, function.local_parameters())?;
    glsl.push('\n');

    let scope = FunctionScope {
        program,
        function,
        dialect: Dialect::Glsl,
        deref_outputs: false,
    };
    write_body(glsl, &scope, function)?;

    let outputs = function.output_parameters();
    if !outputs.is_empty() {
        glsl.push('\n');
    }
    for param in outputs {
        let destination = match stage {
            ShaderStage::Vertex if is_position(param) => "gl_Position".to_string(),
            ShaderStage::Vertex => varying_name(param),
            ShaderStage::Fragment => format!("f_{}", param.name()),
        };
        let _ = writeln!(glsl, "    {destination} = {};", param.name());
    }
    glsl.push_str("}\n");
    Ok(())
}
