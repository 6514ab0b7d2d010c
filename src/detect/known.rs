//! Static tables of well-known libraries.
//!
//! Keys are package roots. A module specifier or declared dependency matches
//! a key when it names the key itself or one of its submodules (see
//! `analysis::module_matches`), so `@nestjs` covers `@nestjs/core` and
//! `sqlalchemy` covers `sqlalchemy.orm`.

use phf::{phf_map, phf_set};

use crate::analysis::module_matches;
use crate::detect::types::OrmFramework;
use crate::parser::Language;

/// ORM packages for TypeScript and JavaScript.
static ECMASCRIPT_ORMS: phf::Map<&'static str, OrmFramework> = phf_map! {
    "typeorm" => OrmFramework::TypeOrm,
    "@mikro-orm" => OrmFramework::MikroOrm,
    "sequelize-typescript" => OrmFramework::SequelizeTypescript,
    "sequelize" => OrmFramework::Sequelize,
    "mongoose" => OrmFramework::Mongoose,
};

static PYTHON_ORMS: phf::Map<&'static str, OrmFramework> = phf_map! {
    "sqlalchemy" => OrmFramework::SqlAlchemy,
    "flask_sqlalchemy" => OrmFramework::SqlAlchemy,
    "django.db" => OrmFramework::Django,
    "sqlmodel" => OrmFramework::SqlModel,
    "peewee" => OrmFramework::Peewee,
};

static JAVA_ORMS: phf::Map<&'static str, OrmFramework> = phf_map! {
    "javax.persistence" => OrmFramework::Jpa,
    "jakarta.persistence" => OrmFramework::Jpa,
    "org.hibernate" => OrmFramework::Jpa,
};

static GO_ORMS: phf::Map<&'static str, OrmFramework> = phf_map! {
    "gorm.io/gorm" => OrmFramework::Gorm,
    "github.com/jinzhu/gorm" => OrmFramework::Gorm,
};

/// Bases that mark a class as a validation schema rather than a table.
pub static VALIDATION_PACKAGES: phf::Set<&'static str> = phf_set! {
    "pydantic",
    "marshmallow",
    "class-validator",
    "zod",
};

pub static FRONTEND_FRAMEWORKS: phf::Set<&'static str> = phf_set! {
    "react",
    "react-dom",
    "vue",
    "@angular",
    "svelte",
    "@sveltejs",
    "next",
    "nuxt",
    "preact",
    "solid-js",
};

pub static WEB_FRAMEWORKS: phf::Set<&'static str> = phf_set! {
    "express",
    "fastify",
    "koa",
    "@nestjs",
    "hapi",
    "@hapi",
    "fastapi",
    "flask",
    "django",
    "starlette",
    "spring-boot-starter-web",
    "org.springframework.web",
    "github.com/gin-gonic/gin",
    "github.com/labstack/echo",
    "github.com/gofiber/fiber",
    "github.com/go-chi/chi",
};

pub static WORKER_FRAMEWORKS: phf::Set<&'static str> = phf_set! {
    "celery",
    "rq",
    "dramatiq",
    "huey",
    "arq",
    "bull",
    "bullmq",
    "agenda",
    "kafkajs",
    "amqplib",
    "github.com/hibiken/asynq",
};

pub static CLI_FRAMEWORKS: phf::Set<&'static str> = phf_set! {
    "commander",
    "yargs",
    "click",
    "typer",
    "github.com/spf13/cobra",
    "github.com/urfave/cli",
    "picocli",
};

/// Database drivers and ORMs: evidence for the data layer.
pub static DATA_PACKAGES: phf::Set<&'static str> = phf_set! {
    "typeorm",
    "@mikro-orm",
    "sequelize",
    "sequelize-typescript",
    "mongoose",
    "mongodb",
    "pg",
    "mysql",
    "mysql2",
    "sqlite3",
    "knex",
    "prisma",
    "@prisma",
    "sqlalchemy",
    "flask_sqlalchemy",
    "django.db",
    "sqlmodel",
    "peewee",
    "psycopg2",
    "asyncpg",
    "pymongo",
    "javax.persistence",
    "jakarta.persistence",
    "org.hibernate",
    "java.sql",
    "org.springframework.data",
    "database/sql",
    "gorm.io/gorm",
    "github.com/jinzhu/gorm",
    "go.mongodb.org/mongo-driver",
};

/// Caches, queues and messaging: evidence for the infrastructure layer.
pub static INFRASTRUCTURE_PACKAGES: phf::Set<&'static str> = phf_set! {
    "redis",
    "ioredis",
    "memcached",
    "kafkajs",
    "amqplib",
    "bull",
    "bullmq",
    "celery",
    "pika",
    "aio_pika",
    "confluent_kafka",
    "kafka",
    "nats",
    "github.com/go-redis/redis",
    "github.com/redis/go-redis",
    "github.com/segmentio/kafka-go",
    "org.springframework.kafka",
};

/// Outbound HTTP clients: evidence for the external layer.
pub static HTTP_CLIENT_PACKAGES: phf::Set<&'static str> = phf_set! {
    "axios",
    "node-fetch",
    "got",
    "superagent",
    "requests",
    "httpx",
    "aiohttp",
    "urllib3",
    "okhttp3",
    "java.net.http",
    "org.apache.http",
    "github.com/go-resty/resty",
};

fn orm_table(language: Language) -> &'static phf::Map<&'static str, OrmFramework> {
    match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => &ECMASCRIPT_ORMS,
        Language::Python => &PYTHON_ORMS,
        Language::Java => &JAVA_ORMS,
        Language::Go => &GO_ORMS,
    }
}

/// The ORM framework a module specifier belongs to, for `language`.
///
/// The most specific (longest) key wins, so `sequelize-typescript` is not
/// mistaken for `sequelize`.
pub fn orm_for_import(language: Language, source: &str) -> Option<OrmFramework> {
    orm_table(language)
        .entries()
        .filter(|(package, _)| module_matches(source, package))
        .max_by_key(|(package, _)| package.len())
        .map(|(_, framework)| *framework)
}

/// The first key of `set` that `name` belongs to.
pub fn matching_package(set: &'static phf::Set<&'static str>, name: &str) -> Option<&'static str> {
    set.iter()
        .filter(|package| module_matches(name, package))
        .max_by_key(|package| package.len())
        .copied()
}

pub fn is_known(set: &'static phf::Set<&'static str>, name: &str) -> bool {
    matching_package(set, name).is_some()
}

/// The registry package name an npm import refers to.
///
/// For scoped packages (`@org/pkg/sub`), returns `@org/pkg`; otherwise the
/// first path segment.
pub fn npm_package_name(import_path: &str) -> String {
    if import_path.starts_with('@') {
        let parts: Vec<&str> = import_path.splitn(3, '/').collect();
        if parts.len() >= 2 {
            format!("{}/{}", parts[0], parts[1])
        } else {
            import_path.to_string()
        }
    } else {
        import_path
            .split('/')
            .next()
            .unwrap_or(import_path)
            .to_string()
    }
}

/// The module an external Go import path belongs to:
/// `github.com/user/repo/pkg` -> `github.com/user/repo`.
pub fn go_module_name(import_path: &str) -> String {
    let parts: Vec<&str> = import_path.split('/').collect();
    if parts.len() >= 3 && parts[0].contains('.') {
        format!("{}/{}/{}", parts[0], parts[1], parts[2])
    } else {
        import_path.to_string()
    }
}

/// The package an external import specifier refers to, or `None` for
/// relative imports.
pub fn external_package(language: Language, source: &str) -> Option<String> {
    if source.starts_with('.') {
        return None;
    }
    let name = match language {
        Language::TypeScript | Language::Tsx | Language::JavaScript => {
            npm_package_name(source.trim_start_matches("node:"))
        }
        Language::Python => source.split('.').next().unwrap_or(source).to_string(),
        Language::Go => go_module_name(source),
        Language::Java => source.to_string(),
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orm_for_import() {
        assert_eq!(
            orm_for_import(Language::TypeScript, "typeorm"),
            Some(OrmFramework::TypeOrm)
        );
        assert_eq!(
            orm_for_import(Language::TypeScript, "@mikro-orm/core"),
            Some(OrmFramework::MikroOrm)
        );
        assert_eq!(
            orm_for_import(Language::TypeScript, "sequelize-typescript"),
            Some(OrmFramework::SequelizeTypescript)
        );
        assert_eq!(
            orm_for_import(Language::Python, "sqlalchemy.orm"),
            Some(OrmFramework::SqlAlchemy)
        );
        assert_eq!(
            orm_for_import(Language::Python, "django.db.models"),
            Some(OrmFramework::Django)
        );
        assert_eq!(orm_for_import(Language::Python, "typeorm"), None);
        assert_eq!(orm_for_import(Language::Go, "gorm.io/gorm"), Some(OrmFramework::Gorm));
    }

    #[test]
    fn test_matching_package() {
        assert_eq!(matching_package(&WEB_FRAMEWORKS, "@nestjs/core"), Some("@nestjs"));
        assert_eq!(matching_package(&WEB_FRAMEWORKS, "expressive"), None);
        assert!(is_known(&FRONTEND_FRAMEWORKS, "react"));
        assert!(is_known(&DATA_PACKAGES, "sqlalchemy.ext.asyncio"));
        assert!(is_known(&WORKER_FRAMEWORKS, "celery"));
    }

    #[test]
    fn test_package_names() {
        assert_eq!(npm_package_name("@org/pkg/sub"), "@org/pkg");
        assert_eq!(npm_package_name("lodash/map"), "lodash");
        assert_eq!(go_module_name("github.com/gin-gonic/gin/binding"), "github.com/gin-gonic/gin");
        assert_eq!(go_module_name("net/http"), "net/http");
        assert_eq!(
            external_package(Language::Python, "sqlalchemy.orm").as_deref(),
            Some("sqlalchemy")
        );
        assert_eq!(external_package(Language::TypeScript, "./user"), None);
    }
}
