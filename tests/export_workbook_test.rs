use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{TimeZone, Utc};
use pensionserver::aggregation::bundle::{COMPANIES_SHEET, PEOPLE_SHEET};
use pensionserver::aggregation::{build_export_bundle, ExportOptions, ExportSources};
use pensionserver::core::shared::enums::{ApprovalStage, ProcessingStatus};
use pensionserver::core::shared::models::{Company, Person};
use pensionserver::export::write_workbook;

fn company(id: i32, name: &str, reg: &str) -> Company {
    let stamp = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    Company {
        id,
        company_name: name.to_string(),
        registration_number: Some(reg.to_string()),
        approval_stage: ApprovalStage::Unapproved,
        status: ProcessingStatus::NotStarted,
        key_financial_data_id: None,
        type_of_scheme: Some("Defined Benefit".to_string()),
        created_at: stamp,
        updated_at: stamp,
    }
}

#[test]
fn test_export_reads_back_with_requested_sheets() {
    let sources = ExportSources {
        companies: vec![
            company(7, "Acme Pensions Ltd", "01234567"),
            company(8, "Highland Trust", "SC123456"),
        ],
        people: vec![Person {
            id: 1,
            registration_number: "01234567".to_string(),
            name: "Jane Doe".to_string(),
            role: Some("Director".to_string()),
            appointment_date: None,
            date_of_birth: None,
        }],
        ..ExportSources::default()
    };
    let options = ExportOptions {
        people_data: true,
        ..ExportOptions::default()
    };

    let bytes = write_workbook(&build_export_bundle(&sources, options)).unwrap();
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();

    assert_eq!(
        workbook.sheet_names(),
        vec![COMPANIES_SHEET.to_string(), PEOPLE_SHEET.to_string()]
    );

    let companies = workbook.worksheet_range(COMPANIES_SHEET).unwrap();
    assert_eq!(companies.height(), 3);
    assert_eq!(companies.get((0, 0)), Some(&Data::String("ID".to_string())));
    assert_eq!(
        companies.get((1, 1)),
        Some(&Data::String("Acme Pensions Ltd".to_string()))
    );

    let people = workbook.worksheet_range(PEOPLE_SHEET).unwrap();
    assert_eq!(people.height(), 2);
    assert_eq!(people.get((1, 2)), Some(&Data::String("Jane Doe".to_string())));
}
