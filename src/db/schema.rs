diesel::table! {
    authorization_flows (session_key, kind) {
        session_key -> Text,
        kind -> Text,
        value -> Text,
        invalid_after -> BigInt,
    }
}

diesel::table! {
    oauth_tokens (id) {
        id -> Integer,
        record -> Text,
        updated_at -> BigInt,
    }
}

diesel::allow_tables_to_appear_in_same_query!(authorization_flows, oauth_tokens);
