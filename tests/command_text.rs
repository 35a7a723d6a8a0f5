use geneva_runner::services::arguments::{ReportRequest, StandardArgumentProvider};
use geneva_runner::services::command::{ReportKind, RunrepCommandBuilder};

fn request(kind: ReportKind) -> ReportRequest {
    ReportRequest {
        kind,
        geneva_user: Some("usr".to_string()),
        geneva_password: Some("pw".to_string()),
        geneva_aga: Some("9999".to_string()),
        output_path: Some("/tmp/r1.csv".to_string()),
        ..ReportRequest::default()
    }
}

#[test]
fn rsl_report_without_optional_parameters_builds_the_exact_script() {
    let mut req = request(ReportKind::Rsl);
    req.rsl_name = Some("netassets".to_string());
    let provider = StandardArgumentProvider::new(req);
    let command = RunrepCommandBuilder::new(ReportKind::Rsl, &provider)
        .build()
        .expect("command should build");

    assert_eq!(
        command.text(),
        "runrep -f empty.lst -b << EOF\n\
         connect usr/pw -k 9999\n\
         read \"netassets.rsl\"\n\
         runfile \"netassets\" -f csv -o \"/tmp/r1.csv\"\n\
         exit\n\
         EOF\n"
    );
    assert_eq!(
        command.obfuscated_text(),
        "runrep -f empty.lst -b << EOF\n\
         connect usr/********* -k 9999\n\
         read \"netassets.rsl\"\n\
         runfile \"netassets\" -f csv -o \"/tmp/r1.csv\"\n\
         exit\n\
         EOF\n"
    );
    assert_eq!(command.output_resource(), "/tmp/r1.csv");
}

#[test]
fn obfuscated_text_differs_from_text_only_in_the_password_token() {
    let mut req = request(ReportKind::Rsl);
    req.rsl_name = Some("netassets".to_string());
    req.portfolio_list = Some("123,456".to_string());
    req.period_start_date = Some("2023-01-01T00:00:00".to_string());
    req.period_end_date = Some("2023-01-31T00:00:00".to_string());
    let provider = StandardArgumentProvider::new(req);
    let command = RunrepCommandBuilder::new(ReportKind::Rsl, &provider)
        .build()
        .expect("command should build");

    let text_lines: Vec<&str> = command.text().lines().collect();
    let obfuscated_lines: Vec<&str> = command.obfuscated_text().lines().collect();
    assert_eq!(text_lines.len(), obfuscated_lines.len());

    let differing: Vec<usize> = text_lines
        .iter()
        .zip(&obfuscated_lines)
        .enumerate()
        .filter(|(_, (plain, masked))| plain != masked)
        .map(|(index, _)| index)
        .collect();
    assert_eq!(differing, vec![1], "only the connect line should differ");
    assert_eq!(obfuscated_lines[1], "connect usr/********* -k 9999");
}

#[test]
fn blank_gsql_query_fails_validation() {
    let provider = StandardArgumentProvider::new(request(ReportKind::Gsql));
    let builder = RunrepCommandBuilder::new(ReportKind::Gsql, &provider);
    let err = builder.validate().unwrap_err();
    assert!(err.message.contains("gsql_query"));
}

#[test]
fn stored_query_target_with_leading_dash_fails_validation() {
    let mut req = request(ReportKind::StoredQuery);
    req.run_command_name = Some("run".to_string());
    req.run_command_target = Some("-Allen".to_string());
    let provider = StandardArgumentProvider::new(req);
    let builder = RunrepCommandBuilder::new(ReportKind::StoredQuery, &provider);
    let err = builder.validate().unwrap_err();
    assert!(err.message.contains("run_command_target"));
}

#[test]
fn period_start_after_period_end_fails_validation_naming_both_values() {
    let mut req = request(ReportKind::Rsl);
    req.rsl_name = Some("netassets".to_string());
    req.period_start_date = Some("2023-03-01T00:00:00".to_string());
    req.period_end_date = Some("2023-01-31T00:00:00".to_string());
    let provider = StandardArgumentProvider::new(req);
    let builder = RunrepCommandBuilder::new(ReportKind::Rsl, &provider);
    let err = builder.validate().unwrap_err();
    assert!(err.message.contains("2023-03-01"));
    assert!(err.message.contains("2023-01-31"));
}

#[test]
fn validation_failure_prevents_building() {
    let provider = StandardArgumentProvider::new(request(ReportKind::Gsql));
    let builder = RunrepCommandBuilder::new(ReportKind::Gsql, &provider);
    assert!(builder.build().is_err());
}

#[test]
fn gsql_report_carries_the_query_verbatim() {
    let mut req = request(ReportKind::Gsql);
    req.gsql_query = Some("select Investment, Quantity from positions;".to_string());
    req.output_format = Some("tsv".to_string());
    let provider = StandardArgumentProvider::new(req);
    let command = RunrepCommandBuilder::new(ReportKind::Gsql, &provider)
        .build()
        .expect("command should build");
    assert!(command
        .text()
        .contains("rungsql -f tsv -o \"/tmp/r1.csv\"\nselect Investment, Quantity from positions;"));
}

#[test]
fn generated_output_resource_is_used_when_no_path_is_configured() {
    let mut req = request(ReportKind::Rsl);
    req.rsl_name = Some("netassets".to_string());
    req.output_path = None;
    req.output_directory = Some("/tmp/reports".to_string());
    let provider = StandardArgumentProvider::new(req);
    let command = RunrepCommandBuilder::new(ReportKind::Rsl, &provider)
        .build()
        .expect("command should build");
    assert!(command.output_resource().starts_with("/tmp/reports/"));
    assert!(command.output_resource().ends_with(".csv"));
    assert!(command
        .text()
        .contains(&format!("-o \"{}\"", command.output_resource())));
}
