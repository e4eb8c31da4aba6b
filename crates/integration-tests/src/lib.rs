//! End-to-end tests live under `tests/`; see `tests/harness/`.
