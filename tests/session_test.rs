mod common;

use std::cell::Cell;

use color_eyre::Result;
use tempfile::TempDir;
use vade::export::{export_to_path, ExportFormat};
use vade::payload::{Assistant, AssistantReply, BatchRequest};
use vade::statistics::{causes_of_death, demographics};
use vade::{FileFormat, FilterOperator, RecordId, Session, SessionConfig, SortKey};

fn survey_session(rows: usize) -> Session {
    let mut session = Session::new(SessionConfig::default());
    session
        .load(common::survey_csv(rows).as_bytes(), FileFormat::Csv)
        .unwrap();
    session
        .load_codebook(common::CODEBOOK_CSV.as_bytes(), FileFormat::Csv)
        .unwrap();
    session
}

fn cell(session: &Session, pos: usize, column: &str) -> String {
    session
        .records()
        .unwrap()
        .value(pos, column)
        .as_str()
        .into_owned()
}

#[test]
fn test_end_to_end_from_files() {
    let dir = TempDir::new().unwrap();
    let records = common::write_file(dir.path(), "records.csv", common::RECORDS_CSV.as_bytes());
    let codebook = common::write_file(dir.path(), "codebook.csv", common::CODEBOOK_CSV.as_bytes());

    let mut session = Session::new(SessionConfig::default());
    session.load_path(&records, None).unwrap();
    session.load_codebook_path(&codebook).unwrap();

    let set = session.records().unwrap();
    assert_eq!(set.headers(), &["id", "age", "Sex of deceased"]);
    assert_eq!(set.len(), 3);
    assert_eq!(cell(&session, 0, "Sex of deceased"), "Male");
    assert_eq!(cell(&session, 1, "Sex of deceased"), "Female");
    assert!(set.value(1, "age").is_empty());
    assert!(set.value(2, "Sex of deceased").is_empty());
    assert_eq!(
        session.decoded().unwrap().variable_for("Sex of deceased"),
        Some("sex")
    );
}

#[test]
fn test_compressed_upload() {
    let dir = TempDir::new().unwrap();
    let path = common::write_gzip(dir.path(), "records.csv.gz", common::RECORDS_CSV.as_bytes());

    let mut session = Session::new(SessionConfig::default());
    session.load_path(&path, None).unwrap();
    assert_eq!(session.len(), 3);
    assert_eq!(cell(&session, 2, "age"), "60");
}

#[test]
fn test_unsupported_file_keeps_existing_data() {
    let dir = TempDir::new().unwrap();
    let records = common::write_file(dir.path(), "records.csv", common::RECORDS_CSV.as_bytes());
    let notes = common::write_file(dir.path(), "notes.txt", b"id,age\n1,2\n");

    let mut session = Session::new(SessionConfig::default());
    session.load_path(&records, None).unwrap();
    session.set_search("60");
    let before = session.records().unwrap().clone();

    let err = session.load_path(&notes, None).unwrap_err();
    assert!(format!("{:#}", err).contains("unsupported format"));
    assert_eq!(session.records().unwrap(), &before);
    assert_eq!(session.view().total(), 1);
}

#[test]
fn test_pagination_over_survey() {
    let mut session = survey_session(123);
    assert_eq!(session.total_pages(), 3);
    session.last_page();
    let view = session.view();
    assert_eq!(view.page.page, 3);
    assert_eq!(view.page.items.len(), 23);
    assert_eq!(view.total(), 123);
}

#[test]
fn test_filter_and_sort_over_decoded_headers() {
    let mut session = survey_session(123);
    session.set_filter("Cause of death", FilterOperator::Equals, "malaria");
    assert_eq!(session.view().total(), 31);

    session.set_filter("Sex of deceased", FilterOperator::Equals, "female");
    let view = session.view();
    assert!(view
        .records(session.records().unwrap())
        .all(|r| r.get(2).as_str() == "Female" && r.get(4).as_str() == "Malaria"));

    session.clear_filters();
    session.set_sort(Some(SortKey::descending("age")));
    let view = session.view();
    let ages: Vec<String> = view.rows.iter().map(|&p| cell(&session, p, "age")).collect();
    assert_eq!(ages[0], "89");
    // empty ages sort first ascending, so last descending
    assert_eq!(ages.last().map(String::as_str), Some(""));
}

#[test]
fn test_selection_survives_query_changes_but_not_new_codebook() {
    let mut session = survey_session(10);
    session.toggle_selection(RecordId(0));
    session.toggle_selection(RecordId(1));
    session.set_search("stroke");
    assert_eq!(session.selection().len(), 2);

    let request = session.batch_request("Which causes are most common?");
    assert_eq!(request.entries.len(), 2);
    assert!(request.entries[0].starts_with("id: 1; Study site: Kisumu; Sex of deceased: Male;"));
    assert!(request.entries[1].contains("Sex of deceased: Female"));

    session
        .load_codebook(common::CODEBOOK_CSV.as_bytes(), FileFormat::Csv)
        .unwrap();
    assert!(session.selection().is_empty());
}

#[test]
fn test_summary_of_decoded_records() {
    let session = survey_session(123);
    let set = session.records().unwrap();

    let demo = demographics(set);
    assert_eq!(demo.site_column.as_deref(), Some("Study site"));
    assert_eq!(demo.sex_column.as_deref(), Some("Sex of deceased"));
    assert_eq!(demo.age_column.as_deref(), Some("age"));
    assert_eq!(
        demo.sites,
        vec![("Kisumu".to_string(), 62), ("Nairobi".to_string(), 61)]
    );
    assert_eq!(
        demo.sexes,
        vec![("Male".to_string(), 82), ("Female".to_string(), 41)]
    );

    let causes = causes_of_death(set);
    assert_eq!(causes.cause_column.as_deref(), Some("Cause of death"));
    assert_eq!(causes.total_with_cause, 123);
    assert_eq!(causes.top_causes[0], ("Malaria".to_string(), 31));
}

struct CountingAssistant {
    calls: Cell<usize>,
}

impl Assistant for CountingAssistant {
    fn ask(&self, request: &BatchRequest) -> Result<AssistantReply> {
        self.calls.set(self.calls.get() + 1);
        Ok(AssistantReply {
            answer: format!("{} records reviewed", request.entries.len()),
            entries: request.entries.len(),
        })
    }
}

#[test]
fn test_ask_assistant_in_chunks() {
    let mut session = Session::new(SessionConfig {
        chunk_size: 2,
        ..SessionConfig::default()
    });
    session
        .load(common::survey_csv(10).as_bytes(), FileFormat::Csv)
        .unwrap();
    let assistant = CountingAssistant {
        calls: Cell::new(0),
    };
    assert!(session.ask(&assistant, "anything?").is_err());

    for id in 0..5 {
        session.toggle_selection(RecordId(id));
    }
    let replies = session.ask(&assistant, "anything?").unwrap();
    assert_eq!(assistant.calls.get(), 3);
    let covered: usize = replies.iter().map(|r| r.entries).sum();
    assert_eq!(covered, 5);
}

#[test]
fn test_export_filtered_view_reloads() {
    let dir = TempDir::new().unwrap();
    let mut session = survey_session(20);
    session.set_search("stroke");
    let view = session.view();
    let path = dir.path().join("stroke.json");
    export_to_path(
        session.records().unwrap(),
        &view.rows,
        &path,
        ExportFormat::Json,
        None,
    )
    .unwrap();

    let mut reloaded = Session::new(SessionConfig::default());
    reloaded.load_path(&path, None).unwrap();
    assert_eq!(reloaded.len(), 5);
    assert_eq!(
        reloaded.records().unwrap().headers(),
        session.records().unwrap().headers()
    );
}
