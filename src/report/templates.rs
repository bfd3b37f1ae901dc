//! Embedded HTML template for the weekly call report.
//!
//! A single self-contained document rendered via minijinja: dark theme,
//! inline CSS, no external assets, suitable for emailing or archiving.

/// The full report page. Context: `report` (serialized [`WeeklyReport`])
/// and `version` (crate version string).
///
/// [`WeeklyReport`]: super::WeeklyReport
pub const REPORT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Tollgate Report {{ report.window_start }} to {{ report.window_end }}</title>
    <style>
        :root {
            --bg-primary: #0f1117;
            --bg-secondary: #1a1d27;
            --bg-tertiary: #242736;
            --border: #2e3245;
            --text-primary: #e1e4ed;
            --text-secondary: #8b8fa3;
            --text-muted: #5f6375;
            --accent: #6366f1;
            --success: #22c55e;
            --warning: #f59e0b;
            --danger: #ef4444;
            --info: #3b82f6;
            --radius: 8px;
            --shadow: 0 1px 3px rgba(0,0,0,0.4);
        }
        *, *::before, *::after { box-sizing: border-box; margin: 0; padding: 0; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            background: var(--bg-primary);
            color: var(--text-primary);
            line-height: 1.6;
            min-height: 100vh;
        }

        .container {
            max-width: 1000px;
            margin: 0 auto;
            padding: 1.5rem;
        }
        .report-header {
            margin-bottom: 1.5rem;
        }
        .report-header h1 {
            font-size: 1.5rem;
            font-weight: 700;
            letter-spacing: -0.02em;
        }
        .report-header h1 span { color: var(--accent); }
        .report-header p {
            color: var(--text-secondary);
            font-size: 0.875rem;
            margin-top: 0.25rem;
        }

        .card {
            background: var(--bg-secondary);
            border: 1px solid var(--border);
            border-radius: var(--radius);
            padding: 1.25rem;
            box-shadow: var(--shadow);
            margin-bottom: 1rem;
        }
        .card-header {
            font-size: 0.875rem;
            font-weight: 600;
            text-transform: uppercase;
            letter-spacing: 0.05em;
            color: var(--text-secondary);
            margin-bottom: 1rem;
            padding-bottom: 0.75rem;
            border-bottom: 1px solid var(--border);
        }
        .stat-grid {
            display: grid;
            grid-template-columns: repeat(auto-fit, minmax(160px, 1fr));
            gap: 1rem;
            margin-bottom: 1rem;
        }
        .stat {
            background: var(--bg-secondary);
            border: 1px solid var(--border);
            border-radius: var(--radius);
            text-align: center;
            padding: 1rem 0.5rem;
            box-shadow: var(--shadow);
        }
        .stat-value {
            font-size: 2rem;
            font-weight: 700;
            line-height: 1.2;
            letter-spacing: -0.03em;
        }
        .stat-label {
            font-size: 0.75rem;
            color: var(--text-secondary);
            text-transform: uppercase;
            letter-spacing: 0.05em;
            margin-top: 0.25rem;
        }
        .stat-value.success { color: var(--success); }
        .stat-value.warning { color: var(--warning); }
        .stat-value.danger { color: var(--danger); }
        .stat-value.info { color: var(--info); }

        .table-wrap { overflow-x: auto; }
        table {
            width: 100%;
            border-collapse: collapse;
            font-size: 0.875rem;
        }
        th {
            text-align: left;
            padding: 0.625rem 0.75rem;
            font-weight: 600;
            color: var(--text-secondary);
            border-bottom: 1px solid var(--border);
            font-size: 0.75rem;
            text-transform: uppercase;
            letter-spacing: 0.05em;
        }
        td {
            padding: 0.625rem 0.75rem;
            border-bottom: 1px solid var(--border);
            color: var(--text-primary);
        }
        tr:last-child td { border-bottom: none; }

        .badge {
            display: inline-block;
            padding: 0.125rem 0.5rem;
            border-radius: 9999px;
            font-size: 0.75rem;
            font-weight: 600;
            letter-spacing: 0.02em;
        }
        .badge-success { background: rgba(34,197,94,0.15); color: var(--success); }
        .badge-danger { background: rgba(239,68,68,0.15); color: var(--danger); }
        .badge-muted { background: rgba(95,99,117,0.2); color: var(--text-muted); }

        .alert {
            padding: 0.75rem 1rem;
            border-radius: var(--radius);
            font-size: 0.875rem;
            margin-top: 1rem;
        }
        .alert-info { background: rgba(59,130,246,0.1); border: 1px solid rgba(59,130,246,0.25); color: var(--info); }
        .alert-warning { background: rgba(245,158,11,0.1); border: 1px solid rgba(245,158,11,0.25); color: var(--warning); }

        .progress {
            height: 6px;
            background: var(--bg-primary);
            border-radius: 3px;
            overflow: hidden;
            margin-top: 0.5rem;
        }
        .progress-bar { height: 100%; border-radius: 3px; }
        .progress-bar.success { background: var(--success); }
        .progress-bar.warning { background: var(--warning); }
        .progress-bar.danger { background: var(--danger); }

        .quota-meta {
            display: flex;
            justify-content: space-between;
            font-size: 0.8125rem;
            color: var(--text-secondary);
            margin-top: 0.375rem;
        }
        .mono { font-family: 'SF Mono', SFMono-Regular, Consolas, monospace; font-size: 0.8125rem; }
        .text-muted { color: var(--text-muted); }
        .empty-state {
            text-align: center;
            padding: 2rem 1rem;
            color: var(--text-muted);
            font-size: 0.875rem;
        }
        .report-footer {
            color: var(--text-muted);
            font-size: 0.75rem;
            text-align: center;
            padding: 1rem 0 0.5rem;
        }
    </style>
</head>
<body>
    <div class="container">
        <div class="report-header">
            <h1>Toll<span>gate</span> call report</h1>
            <p>{{ report.window_start }} to {{ report.window_end }} UTC ({{ report.days }} day{% if report.days != 1 %}s{% endif %})</p>
        </div>

        <div class="stat-grid">
            <div class="stat">
                <div class="stat-value info">{{ report.total_calls }}</div>
                <div class="stat-label">Total Calls</div>
            </div>
            <div class="stat">
                <div class="stat-value {% if report.failed_calls == 0 %}success{% elif report.success_rate < 90 %}danger{% else %}warning{% endif %}">{{ report.success_rate | round(1) }}%</div>
                <div class="stat-label">Success Rate</div>
            </div>
            <div class="stat">
                <div class="stat-value">{{ report.total_tokens }}</div>
                <div class="stat-label">Tokens Used</div>
            </div>
            <div class="stat">
                <div class="stat-value">{{ report.avg_duration_ms | round | int }} ms</div>
                <div class="stat-label">Avg Response</div>
            </div>
            <div class="stat">
                <div class="stat-value {% if report.fallback_count > 0 %}warning{% endif %}">{{ report.fallback_count }}</div>
                <div class="stat-label">Fallbacks</div>
            </div>
        </div>

        <div class="card">
            <div class="card-header">Quota: {{ report.quota.provider }} ({{ report.quota.period }})</div>
            {% if report.quota.limit == 0 %}
            <p class="text-muted">No monthly limit configured for this provider.</p>
            {% else %}
            <div class="progress">
                <div class="progress-bar {% if report.quota.percent_remaining < 15 %}danger{% elif report.quota.percent_remaining < 40 %}warning{% else %}success{% endif %}" style="width: {{ report.quota.percent_used | round(1) }}%"></div>
            </div>
            <div class="quota-meta">
                <span>{{ report.quota.used }} / {{ report.quota.limit }} calls used</span>
                <span>{{ report.quota.percent_remaining | round(1) }}% remaining</span>
            </div>
            {% endif %}
            {% if report.quota.warning %}
            <div class="alert alert-warning">
                Quota warning: fewer than 15% of the monthly calls remain for {{ report.quota.provider }}.
            </div>
            {% endif %}
            {% if report.quota.projection.state == "unlimited" %}
            <div class="alert alert-info">Quota is unlimited; no exhaustion projection.</div>
            {% elif report.quota.projection.state == "no_usage" %}
            <div class="alert alert-info">No usage in this window; cannot project exhaustion.</div>
            {% else %}
            <div class="alert alert-info">
                At {{ report.quota.projection.daily_rate | round(1) }} calls/day, the remaining quota
                lasts about {{ report.quota.projection.days_until_exhaustion | round(1) }} days
                (until {{ report.quota.projection.exhaustion_date }}).
            </div>
            {% endif %}
        </div>

        <div class="card">
            <div class="card-header">Usage by Provider and Owner</div>
            {% if report.usage %}
            <div class="table-wrap">
                <table>
                    <thead>
                        <tr>
                            <th>Provider</th>
                            <th>Owner</th>
                            <th>Calls</th>
                            <th>OK</th>
                            <th>Failed</th>
                            <th>Tokens</th>
                            <th>Avg ms</th>
                            <th>Min ms</th>
                            <th>Max ms</th>
                        </tr>
                    </thead>
                    <tbody>
                        {% for row in report.usage %}
                        <tr>
                            <td>{{ row.provider }}</td>
                            <td>{{ row.key_owner }}</td>
                            <td>{{ row.total_calls }}</td>
                            <td>{{ row.successful_calls }}</td>
                            <td>{% if row.failed_calls > 0 %}<span class="badge badge-danger">{{ row.failed_calls }}</span>{% else %}0{% endif %}</td>
                            <td>{{ row.total_tokens }}</td>
                            <td>{{ row.avg_duration_ms | round | int }}</td>
                            <td>{{ row.min_duration_ms }}</td>
                            <td>{{ row.max_duration_ms }}</td>
                        </tr>
                        {% endfor %}
                    </tbody>
                </table>
            </div>
            {% else %}
            <div class="empty-state">No calls recorded in this window.</div>
            {% endif %}
        </div>

        <div class="card">
            <div class="card-header">Response Times by Day</div>
            {% if report.response_times %}
            <div class="table-wrap">
                <table>
                    <thead>
                        <tr>
                            <th>Date</th>
                            <th>Provider</th>
                            <th>Avg Response (ms)</th>
                        </tr>
                    </thead>
                    <tbody>
                        {% for row in report.response_times %}
                        <tr>
                            <td>{{ row.date }}</td>
                            <td>{{ row.provider }}</td>
                            <td>{{ row.avg_duration_ms | round | int }}</td>
                        </tr>
                        {% endfor %}
                    </tbody>
                </table>
            </div>
            {% else %}
            <div class="empty-state">No successful calls in this window.</div>
            {% endif %}
        </div>

        <div class="card">
            <div class="card-header">Fallback Events</div>
            {% if report.fallbacks %}
            <div class="table-wrap">
                <table>
                    <thead>
                        <tr>
                            <th>Time (UTC)</th>
                            <th>Primary</th>
                            <th>Fallback</th>
                            <th>Outcome</th>
                            <th>Original Error</th>
                        </tr>
                    </thead>
                    <tbody>
                        {% for event in report.fallbacks %}
                        <tr>
                            <td class="mono">{{ event.timestamp }}</td>
                            <td>{{ event.primary_provider }}</td>
                            <td>{{ event.fallback_provider }}</td>
                            <td>{% if event.success %}<span class="badge badge-success">recovered</span>{% else %}<span class="badge badge-danger">failed</span>{% endif %}</td>
                            <td class="mono">{{ event.original_error }}</td>
                        </tr>
                        {% endfor %}
                    </tbody>
                </table>
            </div>
            {% else %}
            <div class="empty-state">No fallbacks in this window.</div>
            {% endif %}
        </div>

        <div class="card">
            <div class="card-header">Recent Errors</div>
            {% if report.errors %}
            <div class="table-wrap">
                <table>
                    <thead>
                        <tr>
                            <th>Time (UTC)</th>
                            <th>Provider</th>
                            <th>Endpoint</th>
                            <th>Owner</th>
                            <th>Error</th>
                        </tr>
                    </thead>
                    <tbody>
                        {% for entry in report.errors %}
                        <tr>
                            <td class="mono">{{ entry.timestamp }}</td>
                            <td>{{ entry.provider }}</td>
                            <td>{{ entry.endpoint }}</td>
                            <td>{{ entry.key_owner }}</td>
                            <td class="mono">{% if entry.error %}{{ entry.error }}{% endif %}</td>
                        </tr>
                        {% endfor %}
                    </tbody>
                </table>
            </div>
            {% else %}
            <div class="empty-state">No errors recorded. Nice.</div>
            {% endif %}
        </div>

        <div class="report-footer">
            Generated by tollgate v{{ version }} at {{ report.generated_at }} UTC
        </div>
    </div>
</body>
</html>
"#;
