use std::path::PathBuf;

use dirtbike_domain::{DebianConvention, DistributionIdentity, NamingConvention, ResolvedPackage};
use serde::Serialize;
use serde_json::json;

use crate::alternate::resolve_alternate;
use crate::assemble::{assemble_wheel, WheelReport};
use crate::config::Config;
use crate::effects::Effects;
use crate::error::ConvertError;
use crate::locate::locate;
use crate::mapper::map_files;
use crate::metadata::resolve_metadata;
use crate::outcome::ExecutionOutcome;
use crate::python::probe_interpreter;

#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub package: String,
    /// Already resolved; created when missing.
    pub destination: PathBuf,
}

pub struct ConvertContext<'a> {
    effects: &'a dyn Effects,
    config: &'a Config,
    convention: &'a dyn NamingConvention,
}

impl<'a> ConvertContext<'a> {
    #[must_use]
    pub fn new(effects: &'a dyn Effects, config: &'a Config) -> Self {
        Self {
            effects,
            config,
            convention: &DebianConvention,
        }
    }

    #[must_use]
    pub fn with_convention(mut self, convention: &'a dyn NamingConvention) -> Self {
        self.convention = convention;
        self
    }
}

/// Everything one successful conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub requested: String,
    pub os_package: Option<String>,
    pub interpreter: String,
    pub identity: DistributionIdentity,
    pub wheel: WheelReport,
}

/// Locates `request.package`, resolves its identity, maps its files and
/// writes the wheel. Either a complete wheel is written or nothing is.
///
/// # Errors
///
/// Any [`ConvertError`] raised by a stage; all are terminal.
pub fn convert(ctx: &ConvertContext<'_>, request: &ConvertRequest) -> Result<Conversion, ConvertError> {
    let requested = request.package.trim();
    if requested.is_empty() {
        return Err(ConvertError::NotFound {
            requested: String::new(),
            candidates: Vec::new(),
            interpreters: Vec::new(),
        });
    }
    let effects = ctx.effects;
    let config = ctx.config;

    let python = effects
        .python()
        .detect_interpreter(config.python())
        .map_err(|err| ConvertError::InterpreterFailed {
            interpreter: config
                .python()
                .map_or_else(|| "python".to_string(), |path| path.display().to_string()),
            reason: format!("{err:#}"),
        })?;
    let current = probe_interpreter(effects.python(), &python, config.interpreter_timeout())?;
    tracing::debug!(interpreter = %current, "current runtime");

    let resolved = resolve(ctx, &current, requested)?;
    let identity = resolve_metadata(effects.fs(), ctx.convention, &resolved)?;
    let files = map_files(effects.fs(), &resolved, &identity)?;
    let wheel = assemble_wheel(
        effects.fs(),
        &identity,
        &files,
        &resolved.interpreter().tags,
        &request.destination,
        config.write_timeout(),
    )?;
    Ok(Conversion {
        requested: requested.to_string(),
        os_package: resolved.os_package_name().map(ToString::to_string),
        interpreter: resolved.interpreter().to_string(),
        identity,
        wheel,
    })
}

fn resolve(
    ctx: &ConvertContext<'_>,
    current: &dirtbike_domain::Interpreter,
    requested: &str,
) -> Result<ResolvedPackage, ConvertError> {
    match locate(ctx.effects.packages(), ctx.convention, current, requested) {
        Err(ConvertError::NotFound {
            candidates,
            interpreters,
            ..
        }) if ctx.config.alternates() => {
            tracing::debug!(requested, "not provided for the current runtime; trying alternates");
            match resolve_alternate(ctx.effects, current, requested, ctx.config.interpreter_timeout()) {
                Err(ConvertError::NotFound {
                    interpreters: alternates,
                    ..
                }) => Err(ConvertError::NotFound {
                    requested: requested.to_string(),
                    candidates,
                    interpreters: interpreters.into_iter().chain(alternates).collect(),
                }),
                other => other,
            }
        }
        other => other,
    }
}

/// [`convert`] wrapped in the outcome envelope the CLI prints.
pub fn execute(ctx: &ConvertContext<'_>, request: &ConvertRequest) -> ExecutionOutcome {
    match convert(ctx, request) {
        Ok(conversion) => {
            let message = format!("wrote {}", conversion.wheel.path.display());
            let details = json!({
                "requested": conversion.requested,
                "os_package": conversion.os_package,
                "interpreter": conversion.interpreter,
                "name": conversion.identity.name,
                "version": conversion.identity.version,
                "source": conversion.identity.source,
                "wheel": conversion.wheel.path,
                "filename": conversion.wheel.filename,
                "tag": conversion.wheel.tag,
                "entries": conversion.wheel.entries.len(),
                "size_bytes": conversion.wheel.size_bytes,
                "sha256": conversion.wheel.sha256,
            });
            ExecutionOutcome::success(message, details)
        }
        Err(err) => {
            tracing::debug!(code = err.code(), "conversion failed");
            ExecutionOutcome::from(&err)
        }
    }
}
