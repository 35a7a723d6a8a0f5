use std::fmt;

use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::constants::runrep;
use crate::errors::StepError;
use crate::services::command::ReportKind;
use crate::services::validation::Validation;
use crate::utils::paths::generated_filename;
use crate::utils::redact::PASSWORD_MASK;
use crate::utils::text::opt_not_blank;

/// Supplies the typed parameters a runrep command is built from. Implementors
/// own validation of their own values; the command builder calls `validate`
/// before assembling any text.
pub trait RunrepArgumentProvider {
    fn geneva_user(&self) -> Option<String>;
    fn geneva_password(&self) -> Option<String>;
    fn geneva_aga(&self) -> Option<String>;
    fn output_path(&self) -> String;
    fn output_directory(&self) -> Option<String>;
    fn output_format(&self) -> String;
    fn portfolio_list(&self) -> Option<String>;
    fn period_start_date(&self) -> Option<String>;
    fn period_end_date(&self) -> Option<String>;
    fn knowledge_date(&self) -> Option<String>;
    fn prior_knowledge_date(&self) -> Option<String>;
    fn accounting_run_type(&self) -> Option<String>;
    fn report_consolidation(&self) -> Option<String>;
    fn extra_flags(&self) -> Option<String>;
    fn rsl_name(&self) -> Option<String>;
    fn gsql_query(&self) -> Option<String>;
    fn run_command_name(&self) -> Option<String>;
    fn run_command_target(&self) -> Option<String>;
    fn validate(&self) -> Result<(), StepError>;
}

/// One report run's parameters, as deserialized from the run configuration.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub geneva_user: Option<String>,
    pub geneva_password: Option<String>,
    pub geneva_aga: Option<String>,
    pub output_path: Option<String>,
    pub output_directory: Option<String>,
    pub output_format: Option<String>,
    pub portfolio_list: Option<String>,
    pub period_start_date: Option<String>,
    pub period_end_date: Option<String>,
    pub knowledge_date: Option<String>,
    pub prior_knowledge_date: Option<String>,
    pub accounting_run_type: Option<String>,
    pub report_consolidation: Option<String>,
    pub extra_flags: Option<String>,
    pub rsl_name: Option<String>,
    pub gsql_query: Option<String>,
    pub run_command_name: Option<String>,
    pub run_command_target: Option<String>,
}

impl fmt::Debug for ReportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportRequest")
            .field("kind", &self.kind)
            .field("geneva_user", &self.geneva_user)
            .field(
                "geneva_password",
                &self.geneva_password.as_ref().map(|_| PASSWORD_MASK),
            )
            .field("geneva_aga", &self.geneva_aga)
            .field("output_path", &self.output_path)
            .field("output_directory", &self.output_directory)
            .field("output_format", &self.output_format)
            .field("portfolio_list", &self.portfolio_list)
            .finish_non_exhaustive()
    }
}

/// Maps a runrep output format to the file extension used when the output
/// path has to be generated.
pub(crate) fn extension_for_format(format: &str) -> Result<&'static str, StepError> {
    match format {
        "json" => Ok(".json"),
        "pdf" | "pdfnoid" => Ok(".pdf"),
        "xml" | "xmlerr" => Ok(".xml"),
        "tsv" => Ok(".tsv"),
        "rmf" => Ok(".rmf"),
        "csv" | "csvnospace" => Ok(".csv"),
        "bcp" | "bcpid" | "bcpnospace" => Ok(".txt"),
        "col" => Ok(".txt"),
        "ascii" | "asciinoid" | "asciinoheader" => Ok(".txt"),
        other => Err(StepError::invalid_params(format!(
            "Unsupported output format: {}",
            other
        ))),
    }
}

/// Standard provider backed by a `ReportRequest`. The resolved output path is
/// computed once so repeated calls agree on the generated filename.
pub struct StandardArgumentProvider {
    request: ReportRequest,
    validation: Validation,
    resolved_output_path: OnceCell<String>,
}

impl StandardArgumentProvider {
    pub fn new(request: ReportRequest) -> Self {
        Self {
            request,
            validation: Validation::new(),
            resolved_output_path: OnceCell::new(),
        }
    }

    fn validate_user_credentials(&self) -> Result<(), StepError> {
        self.validation
            .ensure_not_blank(self.request.geneva_user.as_deref(), "runrep user")?;
        self.validation
            .ensure_not_blank(self.request.geneva_password.as_deref(), "runrep password")?;
        Ok(())
    }

    fn validate_portfolio_list(&self) -> Result<(), StepError> {
        let Some(list) = opt_not_blank(self.request.portfolio_list.clone()) else {
            return Ok(());
        };
        for entry in list.split(',') {
            let entry = entry.trim();
            if entry.contains(' ') && !(entry.starts_with("\\\"") && entry.ends_with("\\\"")) {
                return Err(StepError::invalid_params(format!(
                    "Portfolio argument `{}` contains a space that was not properly escaped, \
                     e.g. `123,\\\"My Portfolio\\\",456`.",
                    list
                )));
            }
        }
        Ok(())
    }

    fn validate_date_logic(&self) -> Result<(), StepError> {
        let start = self.validation.ensure_date(
            self.request.period_start_date.as_deref(),
            "period_start_date",
        )?;
        let end = self
            .validation
            .ensure_date(self.request.period_end_date.as_deref(), "period_end_date")?;
        let knowledge = self
            .validation
            .ensure_date(self.request.knowledge_date.as_deref(), "knowledge_date")?;
        let prior_knowledge = self.validation.ensure_date(
            self.request.prior_knowledge_date.as_deref(),
            "prior_knowledge_date",
        )?;

        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(StepError::invalid_params(format!(
                    "`period_start_date` ({}) must not be after `period_end_date` ({}).",
                    start, end
                )));
            }
        }

        if let (Some(knowledge), Some(prior)) = (knowledge, prior_knowledge) {
            if prior > knowledge {
                return Err(StepError::invalid_params(format!(
                    "`prior_knowledge_date` ({}) must not be after `knowledge_date` ({}).",
                    prior, knowledge
                )));
            }
        }

        if let Some(run_type) = opt_not_blank(self.request.accounting_run_type.clone()) {
            if run_type == runrep::CLOSED_PERIOD_ACCOUNTING && prior_knowledge.is_none() {
                return Err(StepError::invalid_params(format!(
                    "`{}` accounting was selected, `prior_knowledge_date` cannot be blank.",
                    runrep::CLOSED_PERIOD_ACCOUNTING
                )));
            }
        }

        Ok(())
    }

    fn validate_catalog_values(&self) -> Result<(), StepError> {
        if let Some(run_type) = opt_not_blank(self.request.accounting_run_type.clone()) {
            self.validation.ensure_one_of(
                &run_type,
                runrep::ACCOUNTING_RUN_TYPES,
                "accounting_run_type",
            )?;
        }
        if let Some(consolidation) = opt_not_blank(self.request.report_consolidation.clone()) {
            self.validation.ensure_one_of(
                &consolidation,
                runrep::CONSOLIDATION_VALUES,
                "report_consolidation",
            )?;
        }
        extension_for_format(&self.output_format())?;
        Ok(())
    }
}

impl RunrepArgumentProvider for StandardArgumentProvider {
    fn geneva_user(&self) -> Option<String> {
        self.request.geneva_user.clone()
    }

    fn geneva_password(&self) -> Option<String> {
        self.request.geneva_password.clone()
    }

    fn geneva_aga(&self) -> Option<String> {
        self.request.geneva_aga.clone()
    }

    fn output_path(&self) -> String {
        self.resolved_output_path
            .get_or_init(|| {
                opt_not_blank(self.request.output_path.clone()).unwrap_or_else(|| {
                    let extension =
                        extension_for_format(&self.output_format()).unwrap_or(".csv");
                    generated_filename(
                        self.request.output_directory.as_deref().unwrap_or(""),
                        extension,
                    )
                })
            })
            .clone()
    }

    fn output_directory(&self) -> Option<String> {
        self.request.output_directory.clone()
    }

    fn output_format(&self) -> String {
        opt_not_blank(self.request.output_format.clone())
            .unwrap_or_else(|| runrep::DEFAULT_OUTPUT_FORMAT.to_string())
    }

    fn portfolio_list(&self) -> Option<String> {
        self.request.portfolio_list.clone()
    }

    fn period_start_date(&self) -> Option<String> {
        self.request.period_start_date.clone()
    }

    fn period_end_date(&self) -> Option<String> {
        self.request.period_end_date.clone()
    }

    fn knowledge_date(&self) -> Option<String> {
        self.request.knowledge_date.clone()
    }

    fn prior_knowledge_date(&self) -> Option<String> {
        self.request.prior_knowledge_date.clone()
    }

    fn accounting_run_type(&self) -> Option<String> {
        self.request.accounting_run_type.clone()
    }

    fn report_consolidation(&self) -> Option<String> {
        self.request.report_consolidation.clone()
    }

    fn extra_flags(&self) -> Option<String> {
        self.request.extra_flags.clone()
    }

    fn rsl_name(&self) -> Option<String> {
        self.request.rsl_name.clone()
    }

    fn gsql_query(&self) -> Option<String> {
        self.request.gsql_query.clone()
    }

    fn run_command_name(&self) -> Option<String> {
        self.request.run_command_name.clone()
    }

    fn run_command_target(&self) -> Option<String> {
        self.request.run_command_target.clone()
    }

    fn validate(&self) -> Result<(), StepError> {
        self.validate_user_credentials()?;
        self.validate_portfolio_list()?;
        self.validate_date_logic()?;
        self.validate_catalog_values()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{extension_for_format, ReportRequest, RunrepArgumentProvider, StandardArgumentProvider};

    fn base_request() -> ReportRequest {
        ReportRequest {
            geneva_user: Some("usr".to_string()),
            geneva_password: Some("pw".to_string()),
            geneva_aga: Some("9999".to_string()),
            output_path: Some("/tmp/r1.csv".to_string()),
            ..ReportRequest::default()
        }
    }

    #[test]
    fn validate_accepts_minimal_request() {
        let provider = StandardArgumentProvider::new(base_request());
        assert!(provider.validate().is_ok());
    }

    #[test]
    fn validate_rejects_blank_credentials() {
        let mut request = base_request();
        request.geneva_password = Some("  ".to_string());
        let provider = StandardArgumentProvider::new(request);
        let err = provider.validate().unwrap_err();
        assert!(err.message.contains("runrep password"));
    }

    #[test]
    fn validate_rejects_unescaped_portfolio_space() {
        let mut request = base_request();
        request.portfolio_list = Some("123,My Portfolio,456".to_string());
        let provider = StandardArgumentProvider::new(request);
        let err = provider.validate().unwrap_err();
        assert!(err.message.contains("My Portfolio"));
    }

    #[test]
    fn validate_accepts_escaped_portfolio_space() {
        let mut request = base_request();
        request.portfolio_list = Some("123,\\\"My Portfolio\\\",456".to_string());
        let provider = StandardArgumentProvider::new(request);
        assert!(provider.validate().is_ok());
    }

    #[test]
    fn validate_rejects_start_after_end() {
        let mut request = base_request();
        request.period_start_date = Some("2023-02-01T00:00:00".to_string());
        request.period_end_date = Some("2023-01-01T00:00:00".to_string());
        let provider = StandardArgumentProvider::new(request);
        let err = provider.validate().unwrap_err();
        assert!(err.message.contains("2023-02-01"));
        assert!(err.message.contains("2023-01-01"));
    }

    #[test]
    fn validate_rejects_prior_knowledge_after_knowledge() {
        let mut request = base_request();
        request.knowledge_date = Some("2023-01-01T00:00:00".to_string());
        request.prior_knowledge_date = Some("2023-06-01T00:00:00".to_string());
        let provider = StandardArgumentProvider::new(request);
        assert!(provider.validate().is_err());
    }

    #[test]
    fn closed_period_requires_prior_knowledge_date() {
        let mut request = base_request();
        request.accounting_run_type = Some("ClosedPeriod".to_string());
        let provider = StandardArgumentProvider::new(request);
        let err = provider.validate().unwrap_err();
        assert!(err.message.contains("prior_knowledge_date"));

        let mut request = base_request();
        request.accounting_run_type = Some("ClosedPeriod".to_string());
        request.prior_knowledge_date = Some("2022-12-01T12:34:56".to_string());
        let provider = StandardArgumentProvider::new(request);
        assert!(provider.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_accounting_run_type() {
        let mut request = base_request();
        request.accounting_run_type = Some("Sideways".to_string());
        let provider = StandardArgumentProvider::new(request);
        assert!(provider.validate().is_err());
    }

    #[test]
    fn output_format_defaults_to_csv() {
        let provider = StandardArgumentProvider::new(base_request());
        assert_eq!(provider.output_format(), "csv");
    }

    #[test]
    fn generated_output_path_is_stable_across_calls() {
        let mut request = base_request();
        request.output_path = None;
        request.output_directory = Some("/tmp/reports".to_string());
        let provider = StandardArgumentProvider::new(request);
        let first = provider.output_path();
        assert_eq!(first, provider.output_path());
        assert!(first.starts_with("/tmp/reports/"));
        assert!(first.ends_with(".csv"));
    }

    #[test]
    fn extension_map_covers_format_families() {
        assert_eq!(extension_for_format("csv").unwrap(), ".csv");
        assert_eq!(extension_for_format("pdfnoid").unwrap(), ".pdf");
        assert_eq!(extension_for_format("bcpid").unwrap(), ".txt");
        assert!(extension_for_format("parquet").is_err());
    }
}
