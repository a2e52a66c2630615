//! 角色检查工具主入口
//! 列出角色、查看角色权限、执行迁移与数据库健康检查

use std::sync::Arc;

use platform_security::{
    config::AppConfig,
    db,
    models::Metadata,
    repository::{InMemoryRoleStore, PgRoleStore, RoleIndex, RoleStore, RolesRepository},
    services::{predefined, AnnotationRoleDefBuilder, RolesService},
    telemetry,
};

enum Command {
    Roles,
    Role(String),
    Migrate,
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    let command = match args.get(1).map(String::as_str) {
        Some("--version") => {
            println!("security-inspect {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("--help") | None => {
            print_help();
            return Ok(());
        }
        Some("roles") => Command::Roles,
        Some("role") => match args.get(2) {
            Some(name) => Command::Role(name.clone()),
            None => {
                eprintln!("缺少角色名称");
                print_help();
                std::process::exit(1);
            }
        },
        Some("migrate") => Command::Migrate,
        Some("health") => Command::Health,
        Some(other) => {
            eprintln!("未知参数: {}", other);
            print_help();
            std::process::exit(1);
        }
    };

    // 加载 .env 文件（开发环境）
    if let Ok(env) = std::env::var("PSEC_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志与指标
    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    // 3. 编译内置角色
    let compiler = AnnotationRoleDefBuilder::new(Arc::new(Metadata::new()));
    let index = Arc::new(predefined::register_predefined_roles(RoleIndex::builder(), &compiler)?.build());

    // 4. 数据库（可选）
    let pool = db::create_pool(&config.database).await?;

    match (command, pool) {
        (Command::Migrate, Some(pool)) => db::run_migrations(&pool).await?,
        (Command::Health, Some(pool)) => {
            let status = db::health_check(&pool).await;
            println!("{}", serde_json::json!({ "database": status }));
            if !status.is_healthy() {
                std::process::exit(2);
            }
        }
        (Command::Migrate | Command::Health, None) => {
            anyhow::bail!("PSEC_DATABASE__URL is required for this command");
        }
        (command, Some(pool)) => {
            let repository = RolesRepository::new(index, PgRoleStore::new(pool), &config.security);
            inspect(command, RolesService::new(Arc::new(repository))).await?;
        }
        (command, None) => {
            let repository = RolesRepository::new(index, InMemoryRoleStore::default(), &config.security);
            inspect(command, RolesService::new(Arc::new(repository))).await?;
        }
    }

    Ok(())
}

async fn inspect<S: RoleStore>(command: Command, service: RolesService<S>) -> anyhow::Result<()> {
    match command {
        Command::Roles => {
            let roles = service.all_roles().await?;
            tracing::debug!(count = roles.len(), "Listed roles");
            println!("{}", serde_json::to_string_pretty(&roles)?);
        }
        Command::Role(name) => match service.role_by_name(&name).await? {
            Some(role) => println!("{}", serde_json::to_string_pretty(&role)?),
            None => {
                eprintln!("角色不存在: {}", name);
                std::process::exit(1);
            }
        },
        Command::Migrate | Command::Health => {}
    }
    Ok(())
}

/// 打印帮助信息
fn print_help() {
    println!("security-inspect {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: security-inspect <命令>");
    println!();
    println!("命令:");
    println!("  roles         以 JSON 列出全部角色");
    println!("  role <名称>   以 JSON 打印角色及其权限");
    println!("  migrate       执行数据库迁移");
    println!("  health        数据库健康检查");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  PSEC_DATABASE__URL                   数据库连接（可选）");
    println!("  PSEC_SECURITY__ROLES_STORAGE_MODE    database | source_code | mixed");
    println!("  PSEC_LOGGING__LEVEL                  trace | debug | info | warn | error");
}
