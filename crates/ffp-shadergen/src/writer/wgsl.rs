use std::fmt::Write;

use super::expr::{Dialect, FunctionScope};
use super::{
    header, varying_location, vertex_attribute_location, wgsl_library, ProgramWriter, WriterError,
};
use crate::config::TargetLanguage;
use crate::ir::{ElementType, Function, FunctionAtom, Parameter, Program, Semantic, ShaderStage};

const VERTEX_UNIFORM_GROUP: u32 = 0;
const FRAGMENT_UNIFORM_GROUP: u32 = 1;
/// Textures at `2 * unit`, samplers at `2 * unit + 1`.
const SAMPLER_GROUP: u32 = 2;

#[derive(Clone, Copy, Debug, Default)]
pub struct WgslProgramWriter;

impl ProgramWriter for WgslProgramWriter {
    fn target_language(&self) -> TargetLanguage {
        TargetLanguage::Wgsl
    }

    fn file_extension(&self) -> &'static str {
        "wgsl"
    }

    fn entry_point_name(&self, stage: ShaderStage) -> &'static str {
        match stage {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Fragment => "fs_main",
        }
    }

    fn write_source(&self, program: &Program, _profile: &str) -> Result<String, WriterError> {
        program.validate()?;

        let mut wgsl = header(program, TargetLanguage::Wgsl);
        wgsl.push('\n');

        for library in program.dependencies() {
            let source = wgsl_library::source(library).ok_or_else(|| WriterError::UnknownLibrary {
                language: TargetLanguage::Wgsl,
                library: library.clone(),
            })?;
            let _ = writeln!(wgsl, "// {library}");
            wgsl.push_str(source);
            wgsl.push('\n');
        }

        write_uniforms(&mut wgsl, program)?;

        for function in program.functions() {
            if !program.is_entry_point(function.id()) {
                write_helper(&mut wgsl, program, function)?;
            }
        }

        let entry = program.entry_point().ok_or(crate::ir::IrError::MissingEntryPoint)?;
        write_entry_point(&mut wgsl, program, entry, self.entry_point_name(program.stage()))?;
        Ok(wgsl)
    }
}

fn value_type(ty: ElementType) -> Result<&'static str, WriterError> {
    Ok(match ty {
        ElementType::Float1 => "f32",
        ElementType::Float2 => "vec2<f32>",
        ElementType::Float3 => "vec3<f32>",
        ElementType::Float4 => "vec4<f32>",
        ElementType::Matrix3x3 => "mat3x3<f32>",
        ElementType::Matrix4x4 => "mat4x4<f32>",
        ElementType::Int1 => "i32",
        _ => {
            return Err(WriterError::UnsupportedType {
                ty,
                usage: "a WGSL value",
            })
        }
    })
}

fn texture_type(ty: ElementType) -> Result<&'static str, WriterError> {
    Ok(match ty {
        ElementType::Sampler1D => "texture_1d<f32>",
        ElementType::Sampler2D => "texture_2d<f32>",
        ElementType::Sampler3D => "texture_3d<f32>",
        ElementType::SamplerCube => "texture_cube<f32>",
        _ => {
            return Err(WriterError::UnsupportedType {
                ty,
                usage: "a WGSL texture",
            })
        }
    })
}

fn write_uniforms(wgsl: &mut String, program: &Program) -> Result<(), WriterError> {
    let group = match program.stage() {
        ShaderStage::Vertex => VERTEX_UNIFORM_GROUP,
        ShaderStage::Fragment => FRAGMENT_UNIFORM_GROUP,
    };
    let mut binding = 0;
    for param in program.parameters() {
        let ty = param.element_type();
        let name = param.name();
        if ty.is_sampler() {
            let unit = param.index();
            let _ = writeln!(
                wgsl,
                "@group({SAMPLER_GROUP}) @binding({}) var {name}: {};",
                unit * 2,
                texture_type(ty)?
            );
            let _ = writeln!(
                wgsl,
                "@group({SAMPLER_GROUP}) @binding({}) var {name}_sampler: sampler;",
                unit * 2 + 1
            );
        } else {
            let _ = writeln!(
                wgsl,
                "@group({group}) @binding({binding}) var<uniform> {name}: {};",
                value_type(ty)?
            );
            binding += 1;
        }
    }
    if !program.parameters().is_empty() {
        wgsl.push('\n');
    }
    Ok(())
}

fn write_body(
    wgsl: &mut String,
    scope: &FunctionScope<'_>,
    function: &Function,
) -> Result<(), WriterError> {
    let mut atoms: Vec<&FunctionAtom> = function.atom_instances().iter().collect();
    atoms.sort_by_key(|atom| atom.sort_key());
    for atom in atoms {
        let FunctionAtom::Invocation(invocation) = atom;
        let _ = writeln!(wgsl, "    {}", scope.invocation_statement(invocation)?);
    }
    Ok(())
}

fn write_locals(wgsl: &mut String, locals: &[Parameter]) -> Result<(), WriterError> {
    for local in locals {
        let _ = writeln!(
            wgsl,
            "    var {}: {};",
            local.name(),
            value_type(local.element_type())?
        );
    }
    Ok(())
}

fn write_helper(
    wgsl: &mut String,
    program: &Program,
    function: &Function,
) -> Result<(), WriterError> {
    let mut formals = Vec::new();
    for param in function.input_parameters() {
        formals.push(format!("{}: {}", param.name(), value_type(param.element_type())?));
    }
    for param in function.output_parameters() {
        formals.push(format!(
            "{}: ptr<function, {}>",
            param.name(),
            value_type(param.element_type())?
        ));
    }
    if !function.description().is_empty() {
        let _ = writeln!(wgsl, "// {}", function.description());
    }
    let _ = writeln!(wgsl, "fn {}({}) {{", function.name(), formals.join(", "));
    write_locals(wgsl, function.local_parameters())?;
    let scope = FunctionScope {
        program,
        function,
        dialect: Dialect::Wgsl,
        deref_outputs: true,
    };
    write_body(wgsl, &scope, function)?;
    wgsl.push_str("}\n\n");
    Ok(())
}

fn io_attribute(
    stage: ShaderStage,
    is_input: bool,
    param: &Parameter,
) -> Result<String, WriterError> {
    let (semantic, index) = (param.semantic(), param.index());
    match (stage, is_input, semantic) {
        (ShaderStage::Vertex, true, _) => {
            Ok(format!("@location({})", vertex_attribute_location(semantic, index)?))
        }
        (ShaderStage::Vertex, false, Semantic::Position)
        | (ShaderStage::Fragment, true, Semantic::Position) => Ok("@builtin(position)".to_string()),
        (ShaderStage::Fragment, false, Semantic::Color) => Ok(format!("@location({index})")),
        (ShaderStage::Fragment, false, _) => Err(WriterError::UnsupportedSemantic {
            semantic,
            index,
            usage: "a fragment output",
        }),
        _ => Ok(format!("@location({})", varying_location(semantic, index)?)),
    }
}

fn write_io_struct(
    wgsl: &mut String,
    name: &str,
    stage: ShaderStage,
    is_input: bool,
    params: &[Parameter],
) -> Result<(), WriterError> {
    let _ = writeln!(wgsl, "struct {name} {{");
    for param in params {
        let _ = writeln!(
            wgsl,
            "    {} {}: {},",
            io_attribute(stage, is_input, param)?,
            param.name(),
            value_type(param.element_type())?
        );
    }
    wgsl.push_str("}\n\n");
    Ok(())
}

fn write_entry_point(
    wgsl: &mut String,
    program: &Program,
    function: &Function,
    entry_name: &str,
) -> Result<(), WriterError> {
    let stage = program.stage();
    let (stage_attr, input_struct, output_struct) = match stage {
        ShaderStage::Vertex => ("@vertex", "VertexInput", "VertexOutput"),
        ShaderStage::Fragment => ("@fragment", "FragmentInput", "FragmentOutput"),
    };
    let inputs = function.input_parameters();
    let outputs = function.output_parameters();

    if !inputs.is_empty() {
        write_io_struct(wgsl, input_struct, stage, true, inputs)?;
    }
    if !outputs.is_empty() {
        write_io_struct(wgsl, output_struct, stage, false, outputs)?;
    }

    let _ = writeln!(wgsl, "{stage_attr}");
    let params = if inputs.is_empty() {
        String::new()
    } else {
        format!("input: {input_struct}")
    };
    let ret = if outputs.is_empty() {
        String::new()
    } else {
        format!(" -> {output_struct}")
    };
    let _ = writeln!(wgsl, "fn {entry_name}({params}){ret} {{");

    for param in inputs {
        let _ = writeln!(
            wgsl,
            "    var {0}: {1} = input.{0};",
            param.name(),
            value_type(param.element_type())?
        );
    }
    write_locals(wgsl, outputs)?;
    write_locals(wgsl, function.local_parameters())?;
    wgsl.push('\n');

    let scope = FunctionScope {
        program,
        function,
        dialect: Dialect::Wgsl,
        deref_outputs: false,
    };
    write_body(wgsl, &scope, function)?;

    if !outputs.is_empty() {
        wgsl.push('\n');
        let _ = writeln!(wgsl, "    var output: {output_struct};");
        for param in outputs {
            let _ = writeln!(wgsl, "    output.{0} = {0};", param.name());
        }
        wgsl.push_str("    return output;\n");
    }
    wgsl.push_str("}\n");
    Ok(())
}
