use std::io;
use std::sync::{Arc, Mutex};

use ffp_shadergen::config::ShaderGeneratorConfig;
use ffp_shadergen::host::PassState;
use ffp_shadergen::ir::ProgramSet;
use ffp_shadergen::ShaderGenerator;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

fn callees(set: &ProgramSet) -> Vec<String> {
    set.vertex_program()
        .unwrap()
        .entry_point()
        .unwrap()
        .atom_instances()
        .iter()
        .filter_map(|a| a.as_invocation())
        .map(|i| i.function_name().to_string())
        .collect()
}

#[test]
fn per_light_iteration_builds_unlit_and_warns() {
    let pass = PassState {
        lighting_enabled: true,
        iterate_per_light: true,
        shininess: 10.0,
        specular: [1.0; 4],
        ..PassState::default()
    };
    let generator = ShaderGenerator::new(ShaderGeneratorConfig::default());

    let ((result, set), logs) = with_captured_logs(|| {
        let (mut rs, _) = generator.build_render_state("Examples/Brick", "rtss", &pass);
        let mut set = ProgramSet::new();
        let result = rs.create_cpu_programs(&mut set);
        (result, set)
    });

    assert!(result.is_ok(), "{result:?}");
    let vs_callees = callees(&set);
    assert!(
        vs_callees.iter().all(|c| !c.starts_with("ffp_light")),
        "{vs_callees:?}"
    );
    let vs = set.vertex_program().unwrap();
    assert!(vs.parameter_by_name("light_diffuse0").is_none());
    assert!(logs.contains("per-light iteration"), "{logs}");
    assert!(logs.contains("Examples/Brick"), "{logs}");
}

#[test]
fn regular_lighting_emits_light_accumulation() {
    let generator = ShaderGenerator::new(ShaderGeneratorConfig::default());
    let (mut rs, _) = generator.build_render_state("lit", "rtss", &PassState::default());
    let mut set = ProgramSet::new();
    rs.create_cpu_programs(&mut set).unwrap();

    assert!(callees(&set)
        .iter()
        .any(|c| c == "ffp_light_directional_diffuse"));
}
