use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::runrep;
use crate::errors::StepError;
use crate::services::arguments::RunrepArgumentProvider;
use crate::services::validation::Validation;
use crate::utils::redact::mask_secret;
use crate::utils::text::{is_not_blank, opt_not_blank};

/// Which report body the runrep script carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// RSL file-based report (`read` + `runfile`).
    Rsl,
    /// Ad-hoc GSQL query (`rungsql`).
    Gsql,
    /// Stored or named report (`run`/`runfile`/`runf`/`runnumber`/`runquery`).
    StoredQuery,
}

impl Default for ReportKind {
    fn default() -> Self {
        ReportKind::Rsl
    }
}

/// Immutable result of building a runrep script: the executable text, its
/// loggable twin with the password masked, and the remote path the report is
/// written to. Built once; nothing mutates it afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    obfuscated_text: String,
    output_resource: String,
}

impl Command {
    pub fn new(
        text: impl Into<String>,
        obfuscated_text: impl Into<String>,
        output_resource: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            obfuscated_text: obfuscated_text.into(),
            output_resource: output_resource.into(),
        }
    }

    /// The credential-bearing script. Sent over the command channel only;
    /// never log this form.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The script with the password replaced by the fixed mask.
    pub fn obfuscated_text(&self) -> &str {
        &self.obfuscated_text
    }

    /// Remote path of the report the script produces.
    pub fn output_resource(&self) -> &str {
        &self.output_resource
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.obfuscated_text)
            .field("output_resource", &self.output_resource)
            .finish()
    }
}

enum ParameterStyle {
    /// `runfile`-style short flags.
    Short,
    /// `rungsql` does not accept the short forms; it wants the long names.
    Long,
}

impl ParameterStyle {
    fn flags(&self) -> [&'static str; 5] {
        match self {
            ParameterStyle::Short => ["-p", "-ps", "-pe", "-k", "-pk"],
            ParameterStyle::Long => [
                "--Portfolio",
                "--PeriodStartDate",
                "--PeriodEndDate",
                "--KnowledgeDate",
                "--PriorKnowledgeDate",
            ],
        }
    }
}

/// Assembles the four-part runrep script (init / connect / report body /
/// exit) from a parameter source, producing both the executable and the
/// redacted text.
pub struct RunrepCommandBuilder<'a> {
    kind: ReportKind,
    provider: &'a dyn RunrepArgumentProvider,
    validation: Validation,
}

impl<'a> RunrepCommandBuilder<'a> {
    pub fn new(kind: ReportKind, provider: &'a dyn RunrepArgumentProvider) -> Self {
        Self {
            kind,
            provider,
            validation: Validation::new(),
        }
    }

    /// Validates the parameter source plus the report-kind specific rules.
    /// No network activity happens here or in `build`.
    pub fn validate(&self) -> Result<(), StepError> {
        self.provider.validate()?;
        match self.kind {
            ReportKind::Rsl => {
                self.validation
                    .ensure_not_blank(self.provider.rsl_name().as_deref(), "rsl_name")?;
            }
            ReportKind::Gsql => {
                let query = self
                    .validation
                    .ensure_not_blank(self.provider.gsql_query().as_deref(), "gsql_query")?;
                if query.to_lowercase().starts_with("select") && !query.ends_with(';') {
                    return Err(StepError::invalid_params(
                        "`gsql_query` must end with a `;` character",
                    ));
                }
            }
            ReportKind::StoredQuery => {
                let name = self.validation.ensure_not_blank(
                    self.provider.run_command_name().as_deref(),
                    "run_command_name",
                )?;
                self.validation
                    .ensure_one_of(&name, runrep::RUN_COMMAND_NAMES, "run_command_name")?;
                let target = self.validation.ensure_not_blank(
                    self.provider.run_command_target().as_deref(),
                    "run_command_target",
                )?;
                if target.starts_with('-') {
                    return Err(StepError::invalid_params(
                        "`run_command_target` starts with a '-' character; runrep will \
                         misinterpret this as flags. You can fix this issue by temporarily \
                         renaming the object.",
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Command, StepError> {
        self.validate()?;

        let connect = self.connect_line();
        let body = self.report_body();
        let text = format!(
            "{}\n{}\n{}\n{}",
            runrep::INIT_LINE,
            connect,
            body,
            runrep::EXIT_BLOCK
        );
        let password = self.provider.geneva_password().unwrap_or_default();
        let obfuscated_text = mask_secret(&text, &password);

        Ok(Command {
            text,
            obfuscated_text,
            output_resource: self.provider.output_path(),
        })
    }

    fn connect_line(&self) -> String {
        format!(
            "connect {}/{} -k {}",
            self.provider.geneva_user().unwrap_or_default(),
            self.provider.geneva_password().unwrap_or_default(),
            self.provider.geneva_aga().unwrap_or_default()
        )
    }

    fn report_body(&self) -> String {
        match self.kind {
            ReportKind::Rsl => self.rsl_body(),
            ReportKind::Gsql => self.gsql_body(),
            ReportKind::StoredQuery => self.stored_query_body(),
        }
    }

    fn rsl_body(&self) -> String {
        let name_property = self.provider.rsl_name().unwrap_or_default();
        let rsl_name = name_property
            .strip_suffix(".rsl")
            .unwrap_or(&name_property);
        let output = self.provider.output_path();
        let parameters = self.report_parameters(ParameterStyle::Short);

        if is_not_blank(&parameters) {
            format!(
                "read \"{rsl}.rsl\"\nrunfile \"{rsl}\" -f csv -o \"{out}\" {params}",
                rsl = rsl_name,
                out = output,
                params = parameters
            )
        } else {
            format!(
                "read \"{rsl}.rsl\"\nrunfile \"{rsl}\" -f csv -o \"{out}\"",
                rsl = rsl_name,
                out = output
            )
        }
    }

    fn gsql_body(&self) -> String {
        let format = self.provider.output_format();
        let output = self.provider.output_path();
        let parameters = self.report_parameters(ParameterStyle::Long);
        let query = self.provider.gsql_query().unwrap_or_default();

        if is_not_blank(&parameters) {
            format!(
                "rungsql -f {format} -o \"{output}\" {parameters}\n{query}",
            )
        } else {
            format!("rungsql -f {format} -o \"{output}\"\n{query}")
        }
    }

    fn stored_query_body(&self) -> String {
        let format = self.provider.output_format();
        let output = self.provider.output_path();
        let parameters = self.report_parameters(ParameterStyle::Short);
        let name = self.provider.run_command_name().unwrap_or_default();
        let target = self.provider.run_command_target().unwrap_or_default();
        let target = if target.contains(' ') {
            format!("\"{}\"", target)
        } else {
            target
        };

        format!("{name} {target} -f {format} -o {output} {parameters}")
            .trim()
            .to_string()
    }

    fn report_parameters(&self, style: ParameterStyle) -> String {
        let [portfolio, start, end, knowledge, prior] = style.flags();
        [
            format_parameter(portfolio, self.provider.portfolio_list()),
            format_parameter(start, self.provider.period_start_date()),
            format_parameter(end, self.provider.period_end_date()),
            format_parameter(knowledge, self.provider.knowledge_date()),
            format_parameter(prior, self.provider.prior_knowledge_date()),
            self.format_accounting_run_type(),
            self.format_report_consolidation(),
            self.format_extra_flags(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }

    fn format_accounting_run_type(&self) -> Option<String> {
        opt_not_blank(self.provider.accounting_run_type())
            .filter(|value| value != runrep::DYNAMIC_ACCOUNTING)
            .map(|value| format!("-at {}", value))
    }

    fn format_report_consolidation(&self) -> Option<String> {
        opt_not_blank(self.provider.report_consolidation())
            .filter(|value| value != runrep::NONE_CONSOLIDATED)
    }

    fn format_extra_flags(&self) -> Option<String> {
        opt_not_blank(self.provider.extra_flags()).map(|flags| flags.trim().to_string())
    }
}

fn format_parameter(flag: &str, value: Option<String>) -> Option<String> {
    opt_not_blank(value).map(|value| format!("{} {}", flag, value))
}
