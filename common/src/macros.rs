#[macro_export]
macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            Ord,
            PartialOrd,
            Debug,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            pub fn unique() -> $name {
                $name(uuid::Uuid::new_v4())
            }
            pub fn nil() -> $name {
                $name(uuid::Uuid::nil())
            }
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> $name {
                $name(uuid)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(id: &str) -> std::result::Result<$name, Self::Err> {
                Ok($name(uuid::Uuid::parse_str(id)?))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl Default for $name {
            fn default() -> $name {
                $name::nil()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    id_type!(TestId);

    #[test]
    fn unique_ids_differ_and_are_not_nil() {
        let a = TestId::unique();
        let b = TestId::unique();

        assert_ne!(a, b);
        assert!(!a.is_nil());
        assert!(TestId::default().is_nil());
    }

    #[test]
    fn parses_and_displays() -> anyhow::Result<()> {
        let id = TestId::from_str("579ae1d6-10a3-4906-8948-135cb7d7508b")?;
        assert_eq!(id.to_string(), "579ae1d6-10a3-4906-8948-135cb7d7508b");
        assert!(TestId::from_str("not an id").is_err());

        Ok(())
    }
}
