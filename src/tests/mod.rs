// Test modules for Pookie Chat
// Each module exercises the corresponding source module; shared helpers live in `support`

mod support;

mod engine_tests;
mod key_tests;
mod settings_tests;
