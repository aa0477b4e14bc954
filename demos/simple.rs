use std::sync::Arc;
use std::time::SystemTime;

use scopewire::*;

// Define regular traits and implementor structs

trait Logger: Send + Sync {
    fn log(&self, content: &str);
}

trait DateLogger: Send + Sync {
    fn log_date(&self);
}

struct Prefix(&'static str);

struct LoggerImpl {
    prefix: Arc<Prefix>,
}

impl Logger for LoggerImpl {
    fn log(&self, content: &str) {
        println!("[{}] {}", self.prefix.0, content);
    }
}

struct DateLoggerImpl {
    logger: Arc<dyn Logger>,
}

impl DateLogger for DateLoggerImpl {
    fn log_date(&self) {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        self.logger.log(&format!("{secs}s since epoch"));
    }
}

// Describe the constructors

impl Constructible for LoggerImpl {
    fn signature() -> Signature {
        Signature::new().positional::<Prefix>("prefix")
    }

    fn construct(args: &Arguments) -> Result<Self> {
        Ok(Self {
            prefix: args.get("prefix")?,
        })
    }
}

impl Constructible for DateLoggerImpl {
    fn signature() -> Signature {
        Signature::new().positional::<dyn Logger>("logger")
    }

    fn construct(args: &Arguments) -> Result<Self> {
        Ok(Self {
            logger: args.get("logger")?,
        })
    }
}

fn main() -> Result<(), WiringError> {
    let mut injector = Injector::new();

    // The date logger lives in a child scope with its own prefix
    let app_prefix = injector.value(Prefix("app"));
    let date_prefix = injector.value(Prefix("date"));
    let logger = injector
        .class::<LoggerImpl>()
        .strategy(Strategy::Instances)
        .provides::<dyn Logger>(|logger| logger)
        .register();
    let date_logger = injector
        .class::<DateLoggerImpl>()
        .provides::<dyn DateLogger>(|logger| logger)
        .root()
        .register();

    let dates = injector.scope(
        ScopeSpec::new()
            .dependencies([date_prefix, date_logger])
            .dependents([logger]),
    )?;
    injector.scope(
        ScopeSpec::new()
            .scopes([dates])
            .dependencies([app_prefix, logger]),
    )?;

    let b: Arc<dyn DateLogger> = injector.resolve_as()?;
    b.log_date();

    Ok(())
}
