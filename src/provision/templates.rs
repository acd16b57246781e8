//! Config artifacts written by the provisioner

use crate::core::template::Template;
use std::collections::HashMap;

/// Reverse-proxy site in front of the application
pub const NGINX_SITE: Template = Template::new(
    "nginx-site",
    r#"server {
    listen 80;
    server_name {{ server_name }};

    access_log /var/log/nginx/{{ service }}.access.log;
    error_log /var/log/nginx/{{ service }}.error.log;

    client_max_body_size 10M;

    location / {
        proxy_pass http://127.0.0.1:{{ upstream_port }};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_connect_timeout 30s;
        proxy_read_timeout 30s;
    }

    location /static/ {
        alias {{ deploy_root }}/static/;
        expires 7d;
    }
}
"#,
    &["server_name", "service", "upstream_port", "deploy_root"],
);

/// Supervisor unit; runs the launcher, which runs the application
pub const SYSTEMD_UNIT: Template = Template::new(
    "systemd-unit",
    r#"[Unit]
Description={{ description }}
After=network.target mysql.service
Wants=mysql.service

[Service]
Type=simple
User={{ owner }}
Group={{ group }}
WorkingDirectory={{ deploy_root }}
Environment=CABINET_HOME={{ deploy_root }}
Environment=CABINET_VENV={{ venv_dir }}
Environment=CABINET_CONFIG={{ config_path }}
ExecStart={{ launcher_path }} launch
Restart=on-failure
RestartSec=5
KillSignal=SIGTERM
TimeoutStopSec=30

[Install]
WantedBy=multi-user.target
"#,
    &[
        "description",
        "owner",
        "group",
        "deploy_root",
        "venv_dir",
        "config_path",
        "launcher_path",
    ],
);

/// Daily rotation, 30 days kept, compressed
pub const LOGROTATE_POLICY: Template = Template::new(
    "logrotate",
    r#"{{ deploy_root }}/logs/*.log {
    daily
    rotate 30
    missingok
    notifempty
    compress
    delaycompress
    copytruncate
    su {{ owner }} {{ group }}
    create 0640 {{ owner }} {{ group }}
}
"#,
    &["deploy_root", "owner", "group"],
);

/// Runtime configuration installed when the deployment has none
pub const APP_CONFIG: Template = Template::new(
    "app-config",
    r#"# Runtime configuration for the drone cabinet service.
# Replace the secrets below before exposing the service.
database:
  host: "localhost"
  port: 3306
  user: "{{ db_user }}"
  password: "{{ db_password }}"
  name: "{{ db_name }}"
device:
  host: "192.168.1.100"
  port: 502
  timeout_secs: 10
web:
  host: "127.0.0.1"
  port: {{ web_port }}
security:
  secret_key: "your-production-secret-key-change-this"
  api_key: "default-api-key-change-this"
debug: false
"#,
    &["db_user", "db_password", "db_name", "web_port"],
);

/// Build a parameter map from name/value pairs
pub fn params<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Escape a value for a double-quoted YAML scalar
pub fn yaml_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
