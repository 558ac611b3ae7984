//! Startup and infrastructure errors: configuration, pool setup, migrations.
//!
//! Request level failures are [`crate::types::ApiError`] instead.

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        ParseInt(::std::num::ParseIntError);
        ParseBool(::std::str::ParseBoolError);
        R2D2(::r2d2::Error);
    }

    errors {
        Migration(reason: String) {
            description("failed to run database migrations")
            display("failed to run database migrations: {}", reason)
        }
    }
}
