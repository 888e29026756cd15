//! Diesel schema for the meta-tables (§4.6), hand-written to match the
//! migration in `migrations/` (regenerate with `diesel print-schema` if the
//! migration changes).

diesel::table! {
    run (id) {
        id -> Uuid,
        started_at -> Timestamptz,
        ended_at -> Nullable<Timestamptz>,
        status -> Text,
        include_csv -> Nullable<Text>,
        exclude_csv -> Nullable<Text>,
        start_gen -> Nullable<Text>,
        until_gen -> Nullable<Text>,
    }
}

diesel::table! {
    gen_run (run_id, generator_id) {
        run_id -> Uuid,
        generator_id -> Text,
        status -> Text,
        runtime -> Nullable<Double>,
        rate -> Nullable<Double>,
        n_inputs -> Nullable<BigInt>,
        error -> Nullable<Text>,
    }
}

diesel::table! {
    repeats (generator_id, input_hash) {
        generator_id -> Text,
        input_hash -> Text,
        run_id -> Uuid,
    }
}

diesel::table! {
    row_errors (id) {
        id -> BigInt,
        run_id -> Uuid,
        generator_id -> Text,
        input_hash -> Nullable<Text>,
        traceback -> Text,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(run, gen_run, repeats, row_errors,);
