//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Copilot Bridge Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[credentials]
# Leave empty to read COPILOT_GITHUB_TOKEN, GH_TOKEN or GITHUB_TOKEN.
personal_token = ""
# token_url = "https://api.github.com/copilot_internal/v2/token"
# refresh_margin_secs = 300        # 0-3600
# fallback_token_ttl_secs = 7200   # 60-86400
# exchange_retry_delay_ms = 1000   # 0-30000

[backend]
# mode = "direct"                  # direct, remote, local
# model = "gpt-4o"
# chat_url = "https://api.githubcopilot.com/chat/completions"
# remote_url = "https://bridge.example.net"   # required for mode = "remote"
# request_timeout_secs = 30        # 1-600
# max_tokens = 1000                # 1-100000
# temperature = 0.7                # 0.0-2.0

[conversation]
# max_turns = 0                    # 0 keeps the whole history
# system_prompt = "You are a helpful home assistant."

[process]
# Only used with mode = "local".
# binary_path = "/usr/local/bin/copilot"
# host = "127.0.0.1"
# port = 4321
# extra_args = []
# max_restarts = 5                 # 1-20
# restart_backoff_secs = 5         # 0-300
# probe_timeout_secs = 10          # 1-120
# startup_delay_ms = 500           # 0-60000

[logging]
# level = "info"                   # trace, debug, info, warn, error
"##
    .to_string()
}
