use bitflags::bitflags;

use super::parameter::{ElementType, Parameter, ParameterId, ParameterScope, Semantic};
use super::IrError;

/// Texture coordinate sets addressable by a single program stage.
pub const MAX_TEXCOORD_SETS: u32 = 8;
/// Diffuse (0) and specular (1).
pub const MAX_COLOR_SETS: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub(crate) u32);

bitflags! {
    /// Component selection applied to an operand (`.xyz`, `.w`, ...). `Mask::all()` addresses
    /// the whole value.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Mask: u8 {
        const X = 1 << 0;
        const Y = 1 << 1;
        const Z = 1 << 2;
        const W = 1 << 3;
    }
}

impl Mask {
    pub const XY: Mask = Mask::X.union(Mask::Y);
    pub const XYZ: Mask = Mask::XY.union(Mask::Z);

    /// First `n` components, or the whole value when `n >= 4`.
    pub fn first(n: u32) -> Mask {
        match n {
            0 | 4.. => Mask::all(),
            1 => Mask::X,
            2 => Mask::XY,
            _ => Mask::XYZ,
        }
    }

    pub fn is_whole(self) -> bool {
        self == Mask::all()
    }

    pub fn component_count(self) -> u32 {
        self.bits().count_ones()
    }

    /// Component letters in ascending order, e.g. `"xyz"`.
    pub fn swizzle(self) -> String {
        [(Mask::X, 'x'), (Mask::Y, 'y'), (Mask::Z, 'z'), (Mask::W, 'w')]
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, c)| *c)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperandSemantic {
    In,
    Out,
    InOut,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum OperandValue {
    Parameter(ParameterId),
    Literal(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operand {
    value: OperandValue,
    semantic: OperandSemantic,
    mask: Mask,
}

impl Operand {
    pub fn input(id: ParameterId) -> Self {
        Self::with_semantic(id, OperandSemantic::In)
    }

    pub fn output(id: ParameterId) -> Self {
        Self::with_semantic(id, OperandSemantic::Out)
    }

    pub fn in_out(id: ParameterId) -> Self {
        Self::with_semantic(id, OperandSemantic::InOut)
    }

    pub fn literal(value: f32) -> Self {
        Self {
            value: OperandValue::Literal(value),
            semantic: OperandSemantic::In,
            mask: Mask::all(),
        }
    }

    fn with_semantic(id: ParameterId, semantic: OperandSemantic) -> Self {
        Self {
            value: OperandValue::Parameter(id),
            semantic,
            mask: Mask::all(),
        }
    }

    pub fn masked(mut self, mask: Mask) -> Self {
        self.mask = mask;
        self
    }

    pub fn value(&self) -> OperandValue {
        self.value
    }

    pub fn parameter(&self) -> Option<ParameterId> {
        match self.value {
            OperandValue::Parameter(id) => Some(id),
            OperandValue::Literal(_) => None,
        }
    }

    pub fn semantic(&self) -> OperandSemantic {
        self.semantic
    }

    pub fn mask(&self) -> Mask {
        self.mask
    }

    pub fn is_target(&self) -> bool {
        matches!(self.semantic, OperandSemantic::Out | OperandSemantic::InOut)
    }

    pub fn is_argument(&self) -> bool {
        matches!(self.semantic, OperandSemantic::In | OperandSemantic::InOut)
    }
}

/// A call to a library function or generic operation, writing its result into the single
/// out/inout operand.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionInvocation {
    function_name: String,
    group_order: i32,
    internal_order: i32,
    operands: Vec<Operand>,
}

impl FunctionInvocation {
    pub fn new(function_name: impl Into<String>, group_order: i32, internal_order: i32) -> Self {
        Self {
            function_name: function_name.into(),
            group_order,
            internal_order,
            operands: Vec::new(),
        }
    }

    pub fn with(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn push_operand(&mut self, operand: Operand) {
        self.operands.push(operand);
    }

    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    pub fn group_order(&self) -> i32 {
        self.group_order
    }

    pub fn internal_order(&self) -> i32 {
        self.internal_order
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FunctionAtom {
    Invocation(FunctionInvocation),
}

impl FunctionAtom {
    pub fn group_order(&self) -> i32 {
        match self {
            FunctionAtom::Invocation(inv) => inv.group_order(),
        }
    }

    pub fn internal_order(&self) -> i32 {
        match self {
            FunctionAtom::Invocation(inv) => inv.internal_order(),
        }
    }

    pub fn sort_key(&self) -> (i32, i32) {
        (self.group_order(), self.internal_order())
    }

    pub fn as_invocation(&self) -> Option<&FunctionInvocation> {
        match self {
            FunctionAtom::Invocation(inv) => Some(inv),
        }
    }
}

impl From<FunctionInvocation> for FunctionAtom {
    fn from(value: FunctionInvocation) -> Self {
        FunctionAtom::Invocation(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

#[derive(Clone, Debug)]
pub struct Function {
    id: FunctionId,
    name: String,
    description: String,
    inputs: Vec<Parameter>,
    outputs: Vec<Parameter>,
    locals: Vec<Parameter>,
    atoms: Vec<FunctionAtom>,
    atoms_sorted: bool,
}

impl Function {
    pub(crate) fn new(id: FunctionId, name: String, description: String) -> Self {
        Self {
            id,
            name,
            description,
            inputs: Vec::new(),
            outputs: Vec::new(),
            locals: Vec::new(),
            atoms: Vec::new(),
            atoms_sorted: true,
        }
    }

    pub fn id(&self) -> FunctionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_parameters(&self) -> &[Parameter] {
        &self.inputs
    }

    pub fn output_parameters(&self) -> &[Parameter] {
        &self.outputs
    }

    pub fn local_parameters(&self) -> &[Parameter] {
        &self.locals
    }

    /// Finds or creates an input parameter. `index: None` always allocates a fresh parameter
    /// with the next free index for `semantic`.
    pub fn resolve_input_parameter(
        &mut self,
        semantic: Semantic,
        index: Option<u32>,
        ty: ElementType,
    ) -> Result<ParameterId, IrError> {
        self.resolve_varying(Direction::Input, semantic, index, ty)
    }

    /// Finds or creates an output parameter. Same matching rules as
    /// [`Function::resolve_input_parameter`].
    pub fn resolve_output_parameter(
        &mut self,
        semantic: Semantic,
        index: Option<u32>,
        ty: ElementType,
    ) -> Result<ParameterId, IrError> {
        self.resolve_varying(Direction::Output, semantic, index, ty)
    }

    /// Finds or creates a local temporary. Locals are matched by name.
    pub fn resolve_local_parameter(
        &mut self,
        semantic: Semantic,
        index: u32,
        ty: ElementType,
        name: &str,
    ) -> Result<ParameterId, IrError> {
        if ty.is_sampler() {
            return Err(IrError::InvalidLocalType {
                name: name.to_string(),
                ty,
            });
        }
        if let Some(slot) = self.locals.iter().position(|p| p.name() == name) {
            let existing = &self.locals[slot];
            if existing.element_type() != ty {
                return Err(IrError::TypeMismatch {
                    name: name.to_string(),
                    existing: existing.element_type(),
                    requested: ty,
                });
            }
            return Ok(self.local_id(slot));
        }
        self.locals
            .push(Parameter::new(name.to_string(), ty, semantic, index));
        Ok(self.local_id(self.locals.len() - 1))
    }

    pub fn input_parameter_by_semantic(
        &self,
        semantic: Semantic,
        index: u32,
    ) -> Option<ParameterId> {
        find_slot(&self.inputs, semantic, index).map(|slot| self.input_id(slot))
    }

    pub fn output_parameter_by_semantic(
        &self,
        semantic: Semantic,
        index: u32,
    ) -> Option<ParameterId> {
        find_slot(&self.outputs, semantic, index).map(|slot| self.output_id(slot))
    }

    pub fn local_parameter_by_name(&self, name: &str) -> Option<ParameterId> {
        self.locals
            .iter()
            .position(|p| p.name() == name)
            .map(|slot| self.local_id(slot))
    }

    /// Parameter owned by this function, or `None` for global ids and ids of other functions.
    pub fn parameter(&self, id: ParameterId) -> Option<&Parameter> {
        let list = match id.scope {
            ParameterScope::Input(func) if func == self.id => &self.inputs,
            ParameterScope::Output(func) if func == self.id => &self.outputs,
            ParameterScope::Local(func) if func == self.id => &self.locals,
            _ => return None,
        };
        list.get(id.slot as usize)
    }

    pub fn add_atom_instance(&mut self, atom: impl Into<FunctionAtom>) {
        self.atoms.push(atom.into());
        self.atoms_sorted = false;
    }

    /// Stable sort by (group order, internal order).
    pub fn sort_atom_instances(&mut self) {
        if !self.atoms_sorted {
            self.atoms.sort_by_key(FunctionAtom::sort_key);
            self.atoms_sorted = true;
        }
    }

    pub fn atom_instances(&self) -> &[FunctionAtom] {
        &self.atoms
    }

    pub fn atoms_sorted(&self) -> bool {
        self.atoms_sorted
    }

    fn resolve_varying(
        &mut self,
        direction: Direction,
        semantic: Semantic,
        index: Option<u32>,
        ty: ElementType,
    ) -> Result<ParameterId, IrError> {
        if semantic == Semantic::Unknown || ty.is_sampler() {
            return Err(IrError::InvalidVarying { semantic, ty });
        }

        let list = match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        };

        let index = match index {
            Some(index) => {
                if let Some(slot) = find_slot(list, semantic, index) {
                    let existing = &list[slot];
                    if existing.element_type() != ty {
                        return Err(IrError::TypeMismatch {
                            name: existing.name().to_string(),
                            existing: existing.element_type(),
                            requested: ty,
                        });
                    }
                    return Ok(self.id_for(direction, slot));
                }
                index
            }
            None => list
                .iter()
                .filter(|p| p.semantic() == semantic)
                .map(|p| p.index() + 1)
                .max()
                .unwrap_or(0),
        };

        let limit = match semantic {
            Semantic::TexCoord => MAX_TEXCOORD_SETS,
            Semantic::Color => MAX_COLOR_SETS,
            _ => 1,
        };
        if index >= limit {
            return Err(IrError::LimitExceeded {
                semantic,
                index,
                limit,
            });
        }

        let prefix = match direction {
            Direction::Input => 'i',
            Direction::Output => 'o',
        };
        let name = format!("{prefix}{}_{index}", semantic.name_tag());
        let list = match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        };
        list.push(Parameter::new(name, ty, semantic, index));
        let slot = list.len() - 1;
        Ok(self.id_for(direction, slot))
    }

    fn id_for(&self, direction: Direction, slot: usize) -> ParameterId {
        match direction {
            Direction::Input => self.input_id(slot),
            Direction::Output => self.output_id(slot),
        }
    }

    fn input_id(&self, slot: usize) -> ParameterId {
        ParameterId {
            scope: ParameterScope::Input(self.id),
            slot: slot as u32,
        }
    }

    fn output_id(&self, slot: usize) -> ParameterId {
        ParameterId {
            scope: ParameterScope::Output(self.id),
            slot: slot as u32,
        }
    }

    fn local_id(&self, slot: usize) -> ParameterId {
        ParameterId {
            scope: ParameterScope::Local(self.id),
            slot: slot as u32,
        }
    }
}

fn find_slot(list: &[Parameter], semantic: Semantic, index: u32) -> Option<usize> {
    list.iter()
        .position(|p| p.semantic() == semantic && p.index() == index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function() -> Function {
        Function::new(FunctionId(0), "main".into(), String::new())
    }

    #[test]
    fn mask_swizzles_in_component_order() {
        assert_eq!((Mask::W | Mask::X).swizzle(), "xw");
        assert_eq!(Mask::XYZ.swizzle(), "xyz");
        assert_eq!(Mask::first(2), Mask::XY);
        assert!(Mask::first(4).is_whole());
    }

    #[test]
    fn auto_index_allocates_next_free_slot() {
        let mut f = function();
        let a = f
            .resolve_output_parameter(Semantic::TexCoord, Some(0), ElementType::Float2)
            .unwrap();
        let b = f
            .resolve_output_parameter(Semantic::TexCoord, None, ElementType::Float2)
            .unwrap();
        let c = f
            .resolve_output_parameter(Semantic::TexCoord, None, ElementType::Float1)
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(f.parameter(b).unwrap().index(), 1);
        assert_eq!(f.parameter(c).unwrap().index(), 2);
        assert_eq!(f.parameter(c).unwrap().name(), "oTexcoord_2");
    }

    #[test]
    fn texcoord_limit_is_enforced() {
        let mut f = function();
        let err = f
            .resolve_input_parameter(
                Semantic::TexCoord,
                Some(MAX_TEXCOORD_SETS),
                ElementType::Float2,
            )
            .unwrap_err();
        assert!(matches!(err, IrError::LimitExceeded { .. }));
    }

    #[test]
    fn locals_match_by_name_and_reject_type_changes() {
        let mut f = function();
        let a = f
            .resolve_local_parameter(Semantic::Unknown, 0, ElementType::Float4, "texel")
            .unwrap();
        let b = f
            .resolve_local_parameter(Semantic::Unknown, 0, ElementType::Float4, "texel")
            .unwrap();
        assert_eq!(a, b);
        assert!(f
            .resolve_local_parameter(Semantic::Unknown, 0, ElementType::Float2, "texel")
            .is_err());
    }
}
