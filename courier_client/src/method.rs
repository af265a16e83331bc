use std::{any::type_name, collections::HashMap};

use courier_protocol::{Error, ErrorKind, Param, Result};

/// The typed shape of one remote method, fixed when the proxy is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub args_type: &'static str,
    pub reply_type: &'static str,
}

impl MethodDescriptor {
    pub fn of<A: Param, R: Param>(name: &str) -> Self {
        MethodDescriptor {
            name: name.to_owned(),
            args_type: type_name::<A>(),
            reply_type: type_name::<R>(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, MethodDescriptor>,
}

impl MethodTable {
    pub fn insert(&mut self, descriptor: MethodDescriptor) {
        self.methods.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values()
    }

    /// Finds `name` and checks it was registered with these argument and reply types.
    pub fn lookup<A: Param, R: Param>(&self, name: &str) -> Result<&MethodDescriptor> {
        let descriptor = self
            .methods
            .get(name)
            .ok_or_else(|| Error::new(ErrorKind::NoSuchMethod, format!("{} is not registered", name)))?;
        if descriptor.args_type != type_name::<A>() || descriptor.reply_type != type_name::<R>() {
            return Err(Error::new(
                ErrorKind::NoSuchMethod,
                format!(
                    "{} is registered as ({}) -> {}, called as ({}) -> {}",
                    name,
                    descriptor.args_type,
                    descriptor.reply_type,
                    type_name::<A>(),
                    type_name::<R>()
                ),
            ));
        }
        Ok(descriptor)
    }
}
