//! Fallback question bank: deterministic, LLM-independent questions.
//!
//! Used per technology whenever generation fails. Lookup is case-insensitive
//! and goes through a small alias table; unknown technologies get nothing.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::questions::models::{Difficulty, DifficultyMix, QuestionSource, QuestionSpec};

struct BankEntry {
    easy: &'static [&'static str],
    medium: &'static [&'static str],
    hard: &'static [&'static str],
}

impl BankEntry {
    fn templates(&self, difficulty: Difficulty) -> &'static [&'static str] {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

const ALIASES: &[(&str, &str)] = &[
    ("py", "python"),
    ("python3", "python"),
    ("js", "javascript"),
    ("ecmascript", "javascript"),
    ("ts", "typescript"),
    ("reactjs", "react"),
    ("react.js", "react"),
    ("node", "node.js"),
    ("nodejs", "node.js"),
    ("golang", "go"),
    ("postgres", "sql"),
    ("postgresql", "sql"),
    ("mysql", "sql"),
    ("k8s", "kubernetes"),
    ("amazon web services", "aws"),
];

const BANK: &[(&str, BankEntry)] = &[
    (
        "python",
        BankEntry {
            easy: &[
                "What is the difference between a list and a tuple in Python, and when would you use each?",
                "How do you create and activate a virtual environment, and why is it useful?",
                "What does the `with` statement do when working with files?",
            ],
            medium: &[
                "Explain how Python decorators work and give an example of a practical use.",
                "What are generators, and how do they differ from returning a list?",
                "How does exception handling work in Python, including `else` and `finally` blocks?",
            ],
            hard: &[
                "Explain the Global Interpreter Lock and how it affects CPU-bound versus I/O-bound concurrency.",
                "How does Python manage memory, including reference counting and the cyclic garbage collector?",
            ],
        },
    ),
    (
        "django",
        BankEntry {
            easy: &[
                "What is the role of `models.py`, `views.py` and `urls.py` in a Django app?",
                "How do you create and apply database migrations in Django?",
                "What is the Django admin and how do you register a model with it?",
            ],
            medium: &[
                "How does Django's ORM translate querysets into SQL, and when are querysets evaluated?",
                "Explain the difference between `select_related` and `prefetch_related`.",
                "How does Django middleware work, and what would you use custom middleware for?",
            ],
            hard: &[
                "How would you diagnose and fix an N+1 query problem in a high-traffic Django view?",
                "Describe how you would make a long-running Django task asynchronous and keep it reliable.",
            ],
        },
    ),
    (
        "javascript",
        BankEntry {
            easy: &[
                "What is the difference between `==` and `===` in JavaScript?",
                "Explain the difference between `let`, `const` and `var`.",
                "What is the difference between `null` and `undefined`?",
            ],
            medium: &[
                "Explain closures in JavaScript and give a practical use case.",
                "How do Promises and `async`/`await` relate to each other?",
                "What is event delegation and why is it useful?",
            ],
            hard: &[
                "Explain the event loop, including the difference between microtasks and macrotasks.",
                "How does prototypal inheritance work, and how do ES6 classes map onto it?",
            ],
        },
    ),
    (
        "typescript",
        BankEntry {
            easy: &[
                "What problems does TypeScript solve compared to plain JavaScript?",
                "What is the difference between an `interface` and a `type` alias?",
                "What does the `unknown` type offer over `any`?",
            ],
            medium: &[
                "Explain generics in TypeScript with an example of a reusable function.",
                "What are discriminated unions and how do they help with exhaustive checks?",
                "How do utility types like `Partial`, `Pick` and `Record` work?",
            ],
            hard: &[
                "Explain conditional types and the `infer` keyword with an example.",
                "How would you type a function whose return type depends on the shape of its argument?",
            ],
        },
    ),
    (
        "react",
        BankEntry {
            easy: &[
                "What is the difference between props and state in React?",
                "Why do list items in React need a `key`?",
                "What is JSX and how does it relate to `React.createElement`?",
            ],
            medium: &[
                "Explain how `useEffect` dependencies work and common mistakes with them.",
                "When would you reach for `useMemo` or `useCallback`?",
                "How would you share state between distant components without prop drilling?",
            ],
            hard: &[
                "Explain React's reconciliation algorithm and what triggers a re-render.",
                "How would you find and fix a performance problem in a large React component tree?",
            ],
        },
    ),
    (
        "node.js",
        BankEntry {
            easy: &[
                "What is Node.js and what kind of workloads is it well suited for?",
                "What is the purpose of `package.json` and `package-lock.json`?",
                "How do CommonJS `require` and ES module `import` differ?",
            ],
            medium: &[
                "How do streams work in Node.js and when would you use them?",
                "How do you handle errors in asynchronous Node.js code?",
                "What is middleware in Express and how is it ordered?",
            ],
            hard: &[
                "Explain the Node.js event loop phases and how blocking code affects them.",
                "How would you scale a Node.js service across CPU cores and keep it resilient?",
            ],
        },
    ),
    (
        "java",
        BankEntry {
            easy: &[
                "What is the difference between an abstract class and an interface in Java?",
                "What is the difference between `==` and `.equals()`?",
                "What are checked and unchecked exceptions?",
            ],
            medium: &[
                "How does the `HashMap` work internally, and why must `hashCode` and `equals` agree?",
                "Explain the Java Streams API with an example.",
                "What does the `volatile` keyword guarantee?",
            ],
            hard: &[
                "Explain how the JVM garbage collector works and how you would tune it.",
                "How would you diagnose a deadlock in a running Java application?",
            ],
        },
    ),
    (
        "rust",
        BankEntry {
            easy: &[
                "What is ownership in Rust and what happens when a value is moved?",
                "What is the difference between `String` and `&str`?",
                "How do `Option` and `Result` replace null and exceptions?",
            ],
            medium: &[
                "Explain lifetimes and when you need to annotate them explicitly.",
                "What is the difference between trait objects and generics?",
                "How do `Rc`, `Arc` and `RefCell` differ, and when would you use each?",
            ],
            hard: &[
                "Explain `Send` and `Sync` and how they make concurrent code safe.",
                "How does async/await work in Rust, including futures, executors and pinning?",
            ],
        },
    ),
    (
        "go",
        BankEntry {
            easy: &[
                "What is a goroutine and how does it differ from an OS thread?",
                "How are errors handled idiomatically in Go?",
                "What is the difference between a slice and an array?",
            ],
            medium: &[
                "Explain buffered versus unbuffered channels.",
                "How do interfaces work in Go, and what does implicit implementation mean?",
                "What is the `context` package used for?",
            ],
            hard: &[
                "How would you detect and fix a goroutine leak?",
                "Explain how the Go scheduler maps goroutines onto OS threads.",
            ],
        },
    ),
    (
        "sql",
        BankEntry {
            easy: &[
                "What is the difference between INNER JOIN and LEFT JOIN?",
                "What is a primary key and a foreign key?",
                "What is the difference between WHERE and HAVING?",
            ],
            medium: &[
                "How do indexes speed up queries, and what do they cost?",
                "Explain database normalization and when you might denormalize.",
                "What are window functions? Give an example.",
            ],
            hard: &[
                "Explain transaction isolation levels and the anomalies each one prevents.",
                "How would you investigate and optimize a slow query using its execution plan?",
            ],
        },
    ),
    (
        "docker",
        BankEntry {
            easy: &[
                "What is the difference between a Docker image and a container?",
                "What does a Dockerfile do? Name a few common instructions.",
                "How do you persist data beyond a container's lifetime?",
            ],
            medium: &[
                "How do image layers and build caching work?",
                "What are multi-stage builds and why use them?",
                "How does container networking work in Docker Compose?",
            ],
            hard: &[
                "How would you harden a container image for production use?",
                "Explain how namespaces and cgroups provide container isolation.",
            ],
        },
    ),
    (
        "kubernetes",
        BankEntry {
            easy: &[
                "What is a Pod in Kubernetes?",
                "What is the difference between a Deployment and a Service?",
                "What are ConfigMaps and Secrets used for?",
            ],
            medium: &[
                "What is the difference between a Deployment and a StatefulSet?",
                "How do liveness and readiness probes differ?",
                "How does horizontal pod autoscaling work?",
            ],
            hard: &[
                "How would you perform a zero-downtime rollout and roll back if it fails?",
                "How would you troubleshoot a Pod stuck in CrashLoopBackOff?",
            ],
        },
    ),
    (
        "aws",
        BankEntry {
            easy: &[
                "What are the key differences between EC2 and Lambda?",
                "What is S3 and what are typical use cases?",
                "What is an IAM role?",
            ],
            medium: &[
                "How do VPCs, subnets and security groups work together?",
                "When would you choose DynamoDB over RDS?",
                "How would you set up autoscaling for a web application?",
            ],
            hard: &[
                "Design a highly available, multi-AZ architecture for a web service.",
                "How would you reduce cost for a workload with spiky traffic?",
            ],
        },
    ),
];

static LOOKUP: Lazy<HashMap<&'static str, &'static BankEntry>> =
    Lazy::new(|| BANK.iter().map(|(name, entry)| (*name, entry)).collect());

/// Read-only and shared by every session.
pub struct FallbackQuestionBank;

impl FallbackQuestionBank {
    /// Normalizes a technology name onto a bank key.
    pub fn canonical_key(technology: &str) -> String {
        let key = technology
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|(_, target)| target.to_string())
            .unwrap_or(key)
    }

    #[cfg(test)]
    pub fn contains(technology: &str) -> bool {
        LOOKUP.contains_key(Self::canonical_key(technology).as_str())
    }

    /// Questions for `technology`, Easy before Medium before Hard, labelled
    /// with the caller's spelling. Takes at most `mix` per difficulty; an
    /// unknown technology yields an empty list.
    pub fn questions(technology: &str, mix: DifficultyMix) -> Vec<QuestionSpec> {
        let Some(entry) = LOOKUP.get(Self::canonical_key(technology).as_str()) else {
            return Vec::new();
        };

        Difficulty::ALL
            .iter()
            .flat_map(|&difficulty| {
                entry
                    .templates(difficulty)
                    .iter()
                    .take(mix.count(difficulty))
                    .map(move |text| (difficulty, *text))
            })
            .enumerate()
            .map(|(ordinal, (difficulty, text))| QuestionSpec {
                technology: technology.to_string(),
                ordinal,
                difficulty,
                text: text.to_string(),
                source: QuestionSource::Fallback,
            })
            .collect()
    }

    #[cfg(test)]
    pub fn technologies() -> impl Iterator<Item = &'static str> {
        BANK.iter().map(|(name, _)| *name)
    }
}
