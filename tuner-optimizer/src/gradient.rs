use crate::error::{TunerError, TunerResult};
use ndarray::{Array1, ArrayD, Axis, IxDyn};

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: ArrayD<f64>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn from_vec(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(name, Array1::from(values).into_dyn())
    }

    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }
}

/// Parameters sharing one hyperparameter triple. Membership is fixed once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGroup {
    parameters: Vec<Parameter>,
}

impl ParameterGroup {
    pub fn new(parameters: Vec<Parameter>) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Total number of scalar coordinates across the group.
    pub fn num_coordinates(&self) -> usize {
        self.parameters.iter().map(|p| p.value.len()).sum()
    }

    pub(crate) fn into_parameters(self) -> Vec<Parameter> {
        self.parameters
    }
}

/// A gradient as the collaborator hands it over.
///
/// `Sparse` holds row slices of a tensor with shape `dense_shape`: row `indices[i]` receives
/// `values[i]`. Repeated indices accumulate.
#[derive(Debug, Clone, PartialEq)]
pub enum Gradient {
    Dense(ArrayD<f64>),
    Sparse {
        dense_shape: Vec<usize>,
        indices: Vec<usize>,
        values: ArrayD<f64>,
    },
}

impl Gradient {
    pub fn from_vec(values: Vec<f64>) -> Self {
        Gradient::Dense(Array1::from(values).into_dyn())
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Gradient::Dense(values) => values.shape().to_vec(),
            Gradient::Sparse { dense_shape, .. } => dense_shape.clone(),
        }
    }

    pub fn densify(&self) -> TunerResult<ArrayD<f64>> {
        match self {
            Gradient::Dense(values) => Ok(values.clone()),
            Gradient::Sparse {
                dense_shape,
                indices,
                values,
            } => {
                if dense_shape.is_empty() {
                    return Err(TunerError::InvalidSparseGradient {
                        reason: "dense shape has no rows".to_string(),
                    });
                }
                if values.ndim() != dense_shape.len()
                    || values.shape()[0] != indices.len()
                    || values.shape()[1..] != dense_shape[1..]
                {
                    return Err(TunerError::InvalidSparseGradient {
                        reason: format!(
                            "values of shape {:?} do not match {} indices into {:?}",
                            values.shape(),
                            indices.len(),
                            dense_shape
                        ),
                    });
                }
                let mut dense = ArrayD::<f64>::zeros(IxDyn(dense_shape));
                for (row, &index) in indices.iter().enumerate() {
                    if index >= dense_shape[0] {
                        return Err(TunerError::InvalidSparseGradient {
                            reason: format!("row index {} out of bounds for {}", index, dense_shape[0]),
                        });
                    }
                    let mut slot = dense.index_axis_mut(Axis(0), index);
                    slot += &values.index_axis(Axis(0), row);
                }
                Ok(dense)
            }
        }
    }
}

impl From<ArrayD<f64>> for Gradient {
    fn from(values: ArrayD<f64>) -> Self {
        Gradient::Dense(values)
    }
}
