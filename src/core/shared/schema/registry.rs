diesel::table! {
    company_data (id) {
        id -> Int4,
        company_name -> Varchar,
        registration_number -> Nullable<Varchar>,
        approval_stage -> Int4,
        status -> Varchar,
        key_financial_data_id -> Nullable<Int4>,
        type_of_scheme -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    key_financial_data (id) {
        id -> Int4,
        registration_number -> Varchar,
        company_name -> Nullable<Varchar>,
        company_status -> Nullable<Varchar>,
        incorporation_date -> Nullable<Date>,
        latest_accounts_date -> Nullable<Date>,
        turnover -> Jsonb,
        profit -> Jsonb,
        fair_value_assets -> Jsonb,
        surplus -> Jsonb,
        parent_company -> Nullable<Varchar>,
        nationality_of_parent -> Nullable<Varchar>,
        auditor_name_latest -> Nullable<Varchar>,
        auditor_firm_latest -> Nullable<Varchar>,
        number_of_uk_defined_benefit_arrangements -> Nullable<Int4>,
        defined_benefit_arrangements -> Jsonb,
        employer_contrib_latest_year -> Nullable<Numeric>,
        employer_contrib_previous_year -> Nullable<Numeric>,
        benefits_paid -> Nullable<Numeric>,
        expenses_paid_latest_year -> Nullable<Numeric>,
        expenses_paid_previous_year -> Nullable<Numeric>,
        defined_contrib_paid -> Nullable<Numeric>,
        assets_equities -> Nullable<Numeric>,
        assets_bonds -> Nullable<Numeric>,
        assets_real_estate -> Nullable<Numeric>,
        assets_ldi -> Nullable<Numeric>,
        assets_cash -> Nullable<Numeric>,
        assets_other -> Nullable<Numeric>,
        assets_diversified_growth -> Nullable<Numeric>,
        assets_alternatives -> Nullable<Numeric>,
        assets_insurance_contracts -> Nullable<Numeric>,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    people_data (id) {
        id -> Int4,
        registration_number -> Varchar,
        name -> Varchar,
        role -> Nullable<Varchar>,
        appointment_date -> Nullable<Date>,
        date_of_birth -> Nullable<Date>,
    }
}

diesel::table! {
    summary_notes (id) {
        id -> Int4,
        registration_number -> Varchar,
        summary -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    company_pdfs (registration_number) {
        registration_number -> Varchar,
        pdf_links -> Jsonb,
    }
}

diesel::table! {
    company_charges (id) {
        id -> Int4,
        registration_number -> Varchar,
        total_charges -> Int4,
        charges -> Jsonb,
    }
}

diesel::table! {
    csv_file_data (id) {
        id -> Int4,
        company_name -> Nullable<Varchar>,
        registration_number -> Nullable<Varchar>,
        address1 -> Nullable<Varchar>,
        address2 -> Nullable<Varchar>,
        address3 -> Nullable<Varchar>,
        city -> Nullable<Varchar>,
        county -> Nullable<Varchar>,
        postcode -> Nullable<Varchar>,
        source_file -> Varchar,
        uploaded_at -> Timestamptz,
    }
}

diesel::joinable!(company_data -> key_financial_data (key_financial_data_id));
