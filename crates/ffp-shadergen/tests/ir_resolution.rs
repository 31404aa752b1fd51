use ffp_shadergen::ir::{
    ElementType, FunctionInvocation, IrError, Operand, ProgramSet, Semantic, MAX_SAMPLERS,
};

#[test]
fn repeated_input_resolution_returns_the_same_parameter() {
    let mut set = ProgramSet::new();
    let main = set.vertex_program_mut().unwrap().entry_point_mut().unwrap();

    let first = main
        .resolve_input_parameter(Semantic::TexCoord, Some(1), ElementType::Float2)
        .unwrap();
    let second = main
        .resolve_input_parameter(Semantic::TexCoord, Some(1), ElementType::Float2)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(main.input_parameters().len(), 1);
}

#[test]
fn unindexed_resolution_always_allocates() {
    let mut set = ProgramSet::new();
    let main = set.vertex_program_mut().unwrap().entry_point_mut().unwrap();

    let a = main
        .resolve_output_parameter(Semantic::TexCoord, None, ElementType::Float2)
        .unwrap();
    let b = main
        .resolve_output_parameter(Semantic::TexCoord, None, ElementType::Float1)
        .unwrap();

    assert_ne!(a, b);
    let indices: Vec<u32> = main
        .output_parameters()
        .iter()
        .map(|p| p.index())
        .collect();
    assert_eq!(indices, [0, 1]);
}

#[test]
fn local_with_a_different_type_is_rejected() {
    let mut set = ProgramSet::new();
    let main = set.fragment_program_mut().unwrap().entry_point_mut().unwrap();
    main.resolve_local_parameter(Semantic::Unknown, 0, ElementType::Float4, "texel")
        .unwrap();

    let err = main
        .resolve_local_parameter(Semantic::Unknown, 0, ElementType::Float3, "texel")
        .unwrap_err();
    assert!(matches!(err, IrError::TypeMismatch { .. }), "{err}");
}

#[test]
fn sampler_slots_are_bounded() {
    let mut set = ProgramSet::new();
    let ps = set.fragment_program_mut().unwrap();

    ps.resolve_parameter(ElementType::Sampler2D, Some(MAX_SAMPLERS - 1), "texture_sampler")
        .unwrap();
    let err = ps
        .resolve_parameter(ElementType::Sampler2D, Some(MAX_SAMPLERS), "texture_sampler")
        .unwrap_err();
    assert!(matches!(err, IrError::SamplerLimitExceeded { .. }), "{err}");
}

#[test]
fn unindexed_uniforms_never_alias_indexed_ones() {
    let mut set = ProgramSet::new();
    let ps = set.fragment_program_mut().unwrap();

    let a = ps.resolve_parameter(ElementType::Float4, None, "tmp").unwrap();
    let b = ps.resolve_parameter(ElementType::Float4, Some(1), "tmp").unwrap();
    let c = ps.resolve_parameter(ElementType::Float4, None, "tmp").unwrap();
    let d = ps.resolve_parameter(ElementType::Float4, Some(2), "tmp").unwrap();

    assert_ne!(a, c);
    assert_ne!(c, d);
    assert_ne!(a, b);
    assert_eq!(ps.parameter(b).unwrap().name(), "tmp1");
    assert_eq!(ps.parameter(d).unwrap().name(), "tmp2");
    assert_eq!(
        ps.resolve_parameter(ElementType::Float4, Some(1), "tmp").unwrap(),
        b
    );
    assert_eq!(ps.parameters().len(), 4);
}

#[test]
fn atom_sort_keeps_insertion_order_for_equal_keys() {
    let mut set = ProgramSet::new();
    let main = set.vertex_program_mut().unwrap().entry_point_mut().unwrap();
    let out = main
        .resolve_output_parameter(Semantic::Position, Some(0), ElementType::Float4)
        .unwrap();

    for (name, group, internal) in [
        ("third", 20, 0),
        ("first", 10, 5),
        ("second", 10, 5),
        ("zeroth", 10, 1),
    ] {
        main.add_atom_instance(
            FunctionInvocation::new(name, group, internal).with(Operand::output(out)),
        );
    }
    set.sort_atom_instances();

    let main = set.vertex_program().unwrap().entry_point().unwrap();
    let order: Vec<&str> = main
        .atom_instances()
        .iter()
        .filter_map(|a| a.as_invocation())
        .map(|i| i.function_name())
        .collect();
    assert_eq!(order, ["zeroth", "first", "second", "third"]);
}
