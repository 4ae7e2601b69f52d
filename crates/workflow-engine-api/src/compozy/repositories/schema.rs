//! `diesel::table!` declarations for the compozy persistence surface (§6.2).
//!
//! Self-contained, independent of the teacher's own `db::schema` (its legacy
//! `db` module declared queries against a `schema` it never actually defined).

diesel::table! {
    use diesel::sql_types::*;

    workflow_states (workflow_exec_id, org_id) {
        workflow_exec_id -> Uuid,
        workflow_id -> Varchar,
        status -> Varchar,
        input -> Json,
        output -> Nullable<Json>,
        error -> Nullable<Json>,
        usage -> Nullable<Json>,
        org_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    task_states (task_exec_id, org_id) {
        task_exec_id -> Uuid,
        task_id -> Varchar,
        workflow_exec_id -> Uuid,
        parent_state_id -> Nullable<Uuid>,
        component -> Varchar,
        execution_type -> Varchar,
        status -> Varchar,
        agent_id -> Nullable<Varchar>,
        tool_id -> Nullable<Varchar>,
        action_id -> Nullable<Varchar>,
        input -> Json,
        output -> Nullable<Json>,
        error -> Nullable<Json>,
        parallel_state -> Nullable<Json>,
        org_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    use diesel::sql_types::*;

    execution_llm_usage (task_exec_id, component) {
        task_exec_id -> Uuid,
        component -> Varchar,
        workflow_exec_id -> Nullable<Uuid>,
        provider -> Varchar,
        model -> Varchar,
        prompt_tokens -> Int8,
        completion_tokens -> Int8,
        total_tokens -> Int8,
        reasoning_tokens -> Nullable<Int8>,
        cached_prompt_tokens -> Nullable<Int8>,
        org_id -> Uuid,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

// No diesel::joinable! here: every FK in this schema is composite
// (`org_id` included), which the single-column joinable! macro can't express.
// Joins are written explicitly with `.on(...)` in the repositories that need them.
diesel::allow_tables_to_appear_in_same_query!(workflow_states, task_states, execution_llm_usage,);
