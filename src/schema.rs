diesel::table! {
    attendance (id) {
        id -> Text,
        registration_id -> Text,
        checked_in_at -> Timestamp,
        present -> Bool,
        method -> Text,
    }
}

diesel::table! {
    colleges (id) {
        id -> Text,
        name -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    events (id) {
        id -> Text,
        college_id -> Text,
        title -> Text,
        #[sql_name = "type"]
        event_type -> Text,
        description -> Nullable<Text>,
        start_time -> Timestamp,
        end_time -> Timestamp,
        capacity -> Integer,
        status -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    feedback (id) {
        id -> Text,
        registration_id -> Text,
        rating -> Integer,
        comment -> Nullable<Text>,
        submitted_at -> Timestamp,
    }
}

diesel::table! {
    registrations (id) {
        id -> Text,
        event_id -> Text,
        student_id -> Text,
        registered_at -> Timestamp,
        status -> Text,
    }
}

diesel::table! {
    students (id) {
        id -> Text,
        college_id -> Text,
        roll_no -> Nullable<Text>,
        name -> Text,
        email -> Text,
        phone -> Nullable<Text>,
        created_at -> Timestamp,
    }
}

diesel::joinable!(attendance -> registrations (registration_id));
diesel::joinable!(events -> colleges (college_id));
diesel::joinable!(feedback -> registrations (registration_id));
diesel::joinable!(registrations -> events (event_id));
diesel::joinable!(registrations -> students (student_id));
diesel::joinable!(students -> colleges (college_id));

diesel::allow_tables_to_appear_in_same_query!(
    attendance,
    colleges,
    events,
    feedback,
    registrations,
    students,
);
