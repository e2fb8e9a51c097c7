// Test modules for the chat client
// Each module exercises the corresponding source module:
// - model_tests: Message state, temp ids, timestamps, conversation summaries
// - protocol_tests: wire envelope, inbound classification, field fallbacks
// - reconcile_tests: dedup, in-place confirmation, match precedence
// - conversation_tests: view state machine with a fake socket
// - history_tests: REST loader against a local HTTP server
// - connection_tests: socket lifecycle and end-to-end against a local WebSocket server
// - config_tests: settings persistence and session handling

mod helpers;

mod connection_tests;
