// Hand-maintained to mirror `diesel print-schema` output; kept in sync with
// migrations/ by hand since there is no live database to introspect here.

diesel::table! {
    users (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 32]
        phone_number -> Varchar,
        #[max_length = 64]
        timezone -> Varchar,
        quiet_hours_start_minute -> Int4,
        quiet_hours_end_minute -> Int4,
        best_hours -> Nullable<Array<Nullable<Int4>>>,
        best_weekdays -> Nullable<Array<Nullable<Int4>>>,
        avg_response_latency_seconds -> Nullable<Int4>,
        engagement_score -> Nullable<Float8>,
        verified -> Bool,
        #[max_length = 64]
        point_of_contact_agent -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    messages (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 26]
        user_id -> Bpchar,
        #[max_length = 16]
        role -> Varchar,
        #[max_length = 16]
        direction -> Varchar,
        content -> Text,
        #[max_length = 16]
        status -> Varchar,
        #[max_length = 64]
        provider_message_id -> Nullable<Varchar>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        sent_at -> Nullable<Timestamptz>,
        delivered_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    events (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 128]
        event_type -> Varchar,
        #[max_length = 26]
        aggregate_id -> Bpchar,
        #[max_length = 64]
        aggregate_type -> Varchar,
        payload -> Jsonb,
        metadata -> Jsonb,
        processed -> Bool,
        version -> Int4,
        created_at -> Timestamptz,
        processed_at -> Nullable<Timestamptz>,
        #[max_length = 64]
        created_by -> Nullable<Varchar>,
    }
}

diesel::table! {
    event_dead_letters (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 26]
        event_id -> Bpchar,
        #[max_length = 128]
        event_type -> Varchar,
        payload -> Jsonb,
        error_message -> Text,
        retry_count -> Int4,
        original_created_at -> Timestamptz,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    agent_tasks (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 64]
        task_type -> Varchar,
        #[max_length = 64]
        agent_type -> Varchar,
        #[max_length = 26]
        user_id -> Nullable<Bpchar>,
        context -> Jsonb,
        scheduled_for -> Timestamptz,
        #[max_length = 16]
        priority -> Varchar,
        #[max_length = 16]
        status -> Varchar,
        retry_count -> Int4,
        max_retries -> Int4,
        last_attempted_at -> Nullable<Timestamptz>,
        result -> Nullable<Jsonb>,
        error_log -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    message_queue (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 26]
        user_id -> Bpchar,
        #[max_length = 64]
        producer_id -> Varchar,
        payload -> Jsonb,
        rendered_text -> Nullable<Text>,
        #[max_length = 16]
        priority -> Varchar,
        scheduled_for -> Timestamptz,
        #[max_length = 16]
        status -> Varchar,
        requires_fresh_context -> Bool,
        #[max_length = 26]
        supersedes_of -> Nullable<Bpchar>,
        #[max_length = 64]
        superseded_reason -> Nullable<Varchar>,
        #[max_length = 26]
        delivered_message_id -> Nullable<Bpchar>,
        #[max_length = 128]
        idempotency_key -> Nullable<Varchar>,
        render_retry_count -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    user_message_budget (user_id, date) {
        #[max_length = 26]
        user_id -> Bpchar,
        date -> Date,
        messages_sent -> Int4,
        last_message_at -> Nullable<Timestamptz>,
        daily_limit -> Int4,
        hourly_limit -> Int4,
        quiet_hours_enabled -> Bool,
    }
}

diesel::joinable!(messages -> users (user_id));
diesel::joinable!(message_queue -> users (user_id));
diesel::joinable!(agent_tasks -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    messages,
    events,
    event_dead_letters,
    agent_tasks,
    message_queue,
    user_message_budget,
);
