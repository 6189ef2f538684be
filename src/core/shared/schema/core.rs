diesel::table! {
    users (id) {
        id -> Int4,
        first_name -> Varchar,
        last_name -> Varchar,
        email -> Varchar,
        password -> Varchar,
        terms_accepted -> Bool,
        created_at -> Timestamptz,
        password_updated_at -> Nullable<Timestamptz>,
    }
}
