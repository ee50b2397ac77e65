//! WGSL Shader Validation
//!
//! Every built-in module goes through naga before wgpu sees it, so a broken
//! shader turns into a readable error instead of a device panic.

use crate::utils::{Result, VisualizerError};

/// Validates a WGSL module
///
/// Checks that the source is non-empty, has both entry points, parses, and
/// passes naga's validator.
pub fn validate_shader(label: &str, wgsl_src: &str) -> Result<()> {
    if wgsl_src.trim().is_empty() {
        return Err(VisualizerError::Shader(format!(
            "[{}] Shader source is empty",
            label
        )));
    }

    validate_entry_points(label, wgsl_src)?;
    validate_wgsl_syntax(label, wgsl_src)?;

    Ok(())
}

/// Validate required shader entry points
fn validate_entry_points(label: &str, wgsl_src: &str) -> Result<()> {
    if !wgsl_src.contains("@vertex") || !wgsl_src.contains("fn vs_main") {
        return Err(VisualizerError::Shader(format!(
            "[{}] Shader missing vertex entry point 'fn vs_main'",
            label
        )));
    }

    if !wgsl_src.contains("@fragment") || !wgsl_src.contains("fn fs_main") {
        return Err(VisualizerError::Shader(format!(
            "[{}] Shader missing fragment entry point 'fn fs_main'",
            label
        )));
    }

    Ok(())
}

/// Validate WGSL syntax using naga parser
fn validate_wgsl_syntax(label: &str, wgsl_src: &str) -> Result<()> {
    log::debug!("Validating WGSL module '{}' with naga", label);

    let module = naga::front::wgsl::parse_str(wgsl_src).map_err(|parse_error| {
        let error_msg = format!(
            "[{}] WGSL Parse Error:\n{}",
            label,
            parse_error.emit_to_string(wgsl_src)
        );
        log::error!("Shader parse failed: {}", error_msg);
        VisualizerError::Shader(error_msg)
    })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );

    if let Err(validation_error) = validator.validate(&module) {
        let error_msg = format!(
            "[{}] WGSL Validation Error:\n{}",
            label,
            validation_error.emit_to_string(wgsl_src)
        );
        log::error!("Shader validation failed: {}", error_msg);
        return Err(VisualizerError::Shader(error_msg));
    }

    log::debug!("Naga validation passed for '{}'", label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::shader_constants::builtin_shaders;

    #[test]
    fn test_builtin_shaders_validate() {
        for (label, src) in builtin_shaders() {
            if let Err(e) = validate_shader(label, &src) {
                panic!("built-in shader {} failed: {}", label, e);
            }
        }
    }

    #[test]
    fn test_validate_empty_shader() {
        let result = validate_shader("empty", "   ");
        assert!(matches!(result, Err(VisualizerError::Shader(_))));
    }

    #[test]
    fn test_validate_missing_entry_points() {
        let shader = r#"
            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0, 0.0, 0.0, 1.0);
            }
        "#;
        let err = validate_shader("frag_only", shader).unwrap_err();
        assert!(err.to_string().contains("vs_main"));
    }

    #[test]
    fn test_parse_error_names_the_module() {
        let shader = r#"
            @vertex
            fn vs_main() -> @builtin(position) vec4<f32> {
                return vec4<f32>(0.0, 0.0, 0.0, 1.0)
            }
            @fragment
            fn fs_main() -> @location(0) vec4<f32> {
                return vec4<f32>(1.0);
            }
        "#;
        let err = validate_shader("broken", shader).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("[broken]"));
        assert!(message.contains("Parse Error"));
    }
}
