use crate::error::{Error, Result};
use crate::query::expr::{Duration, Emit, WindowKind, WindowSpec};

/// Renders the accumulated [`WindowSpec`] into `WINDOW...` text.
pub struct WindowBuilder;

impl WindowBuilder {
    pub fn build(spec: &WindowSpec) -> Result<String> {
        match spec.kind {
            WindowKind::Tumbling => Self::build_tumbling_or_hopping("TUMBLING", spec, None),
            WindowKind::Hopping => {
                let advance_by = spec.advance_by.ok_or_else(|| {
                    Error::Translation("HOPPING window requires an ADVANCE BY duration".into())
                })?;
                Self::build_tumbling_or_hopping("HOPPING", spec, Some(advance_by))
            }
            WindowKind::Session => Self::build_session(spec),
        }
    }

    fn build_tumbling_or_hopping(
        keyword: &str,
        spec: &WindowSpec,
        advance_by: Option<Duration>,
    ) -> Result<String> {
        let size = spec
            .size
            .ok_or_else(|| Error::Translation(format!("{} window requires a SIZE duration", keyword)))?;

        let mut inner = format!("SIZE {}", render_duration(size));
        if let Some(advance_by) = advance_by {
            inner.push_str(&format!(", ADVANCE BY {}", render_duration(advance_by)));
        }
        if let Some(retention) = spec.retention {
            inner.push_str(&format!(", RETENTION {}", render_duration(retention)));
        }
        if let Some(grace) = spec.grace_period {
            inner.push_str(&format!(", GRACE PERIOD {}", render_duration(grace)));
        }

        let mut text = format!("WINDOW {} ({})", keyword, inner);
        if spec.emit == Emit::Final {
            text.push_str(" EMIT FINAL");
        }
        Ok(text)
    }

    fn build_session(spec: &WindowSpec) -> Result<String> {
        if spec.retention.is_some() || spec.grace_period.is_some() || spec.emit == Emit::Final {
            return Err(Error::Unsupported(
                "SESSION windows do not accept RETENTION, GRACE PERIOD, or EMIT FINAL".into(),
            ));
        }
        let gap = spec
            .gap
            .ok_or_else(|| Error::Translation("SESSION window requires a GAP duration".into()))?;
        Ok(format!("WINDOW SESSION (GAP {})", render_duration(gap)))
    }
}

fn render_duration(duration: Duration) -> String {
    format!("{} {}", duration.amount, duration.unit.as_ksql())
}
