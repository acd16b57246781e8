//! Scenario-based tests for cabinet-deploy

mod fail_fast;
mod full_run;
mod reverse_proxy;
mod schema;
