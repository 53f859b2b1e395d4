use naga::WithSpan;
use naga::front::wgsl;
use naga::front::wgsl::ParseError;
use naga::valid::{Capabilities, ModuleInfo, ValidationError, ValidationFlags, Validator};

#[derive(Debug)]
pub enum ShaderValidError {
    Parse(ParseError),
    Validation(WithSpan<ValidationError>),
}

impl ShaderValidError {
    pub fn emit_to_stderr_with_path(&self, source: &str, path: &str) {
        match self {
            ShaderValidError::Parse(e) => e.emit_to_stderr_with_path(source, path),
            ShaderValidError::Validation(e) => e.emit_to_stderr_with_path(source, path),
        }
    }
}

/// Parses and validates WGSL the way the device would at pipeline creation.
pub fn validate_wgsl_source(shader: &str) -> Result<ModuleInfo, ShaderValidError> {
    let module = wgsl::parse_str(shader).map_err(ShaderValidError::Parse)?;
    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(&module)
        .map_err(ShaderValidError::Validation)
}
